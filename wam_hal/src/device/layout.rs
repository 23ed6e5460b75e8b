//! Product layouts.
//!
//! A layout says which pucks a device drives, how they are grouped on the
//! bus and which factory transforms couple them. Joint order is block
//! order, then member order inside each block.

use super::transform::{BlockTransform, JointTransforms};
use wam_common::config::ProductKind;
use wam_common::protocol::address::{GroupId, NodeId};

/// One coupled set of pucks sharing a torque group and a position group.
#[derive(Debug, Clone)]
pub struct PuckBlock {
    pub torque_group: GroupId,
    pub position_group: GroupId,
    pub pucks: Vec<NodeId>,
    pub transform: BlockTransform,
}

#[derive(Debug, Clone)]
pub struct DeviceLayout {
    pub name: String,
    pub blocks: Vec<PuckBlock>,
    /// Whether a safety module supervises this device.
    pub safety_module: bool,
    /// Send every puck through HI once it is up (hand fingers).
    pub home_on_init: bool,
    /// Kinematic tip for downstream consumers. Not used on the bus.
    pub tip_link: String,
}

#[rustfmt::skip]
const UPPER_ARM_MPOS2JPOS: [f64; 16] = [
    -0.0238095, 0.0, 0.0, 0.0,
    0.0, 0.0176991, -0.0176991, 0.0,
    0.0, -0.0297345, -0.0297345, 0.0,
    0.0, 0.0, 0.0, -0.0555556,
];
#[rustfmt::skip]
const UPPER_ARM_JPOS2MPOS: [f64; 16] = [
    -42.0, 0.0, 0.0, 0.0,
    0.0, 28.25, -16.8155, 0.0,
    0.0, -28.25, -16.8155, 0.0,
    0.0, 0.0, 0.0, -18.0,
];
#[rustfmt::skip]
const UPPER_ARM_JTRQ2MTRQ: [f64; 16] = [
    -0.0238095, 0.0, 0.0, 0.0,
    0.0, 0.0176991, -0.0297345, 0.0,
    0.0, -0.0176991, -0.0297345, 0.0,
    0.0, 0.0, 0.0, -0.0555556,
];

#[rustfmt::skip]
const FOREARM_MPOS2JPOS: [f64; 9] = [
    0.0527426, 0.0527426, 0.0,
    -0.0527426, 0.0527426, 0.0,
    0.0, 0.0, -0.0669792,
];
#[rustfmt::skip]
const FOREARM_JPOS2MPOS: [f64; 9] = [
    9.48, -9.48, 0.0,
    9.48, 9.48, 0.0,
    0.0, 0.0, -14.93,
];
#[rustfmt::skip]
const FOREARM_JTRQ2MTRQ: [f64; 9] = [
    0.0527426, -0.0527426, 0.0,
    0.0527426, 0.0527426, 0.0,
    0.0, 0.0, -0.0669792,
];

/// Finger and spread reductions of the BH8-280.
const HAND_RATIOS: [f64; 4] = [-0.0077437, -0.0077437, -0.0077437, -0.057268];

impl DeviceLayout {
    pub fn for_product(product: ProductKind) -> Self {
        match product {
            ProductKind::Wam4 => Self::wam4(),
            ProductKind::Wam7 => Self::wam7(),
            ProductKind::BarrettHand => Self::bh8_280(),
        }
    }

    /// 4-DOF arm: pucks 1-4 in the upper-arm groups.
    pub fn wam4() -> Self {
        Self {
            name: "wam4".to_string(),
            blocks: vec![upper_arm()],
            safety_module: true,
            home_on_init: false,
            tip_link: String::new(),
        }
    }

    /// 7-DOF arm: adds pucks 5-7 in the forearm groups.
    pub fn wam7() -> Self {
        Self {
            name: "wam7".to_string(),
            blocks: vec![
                upper_arm(),
                PuckBlock {
                    torque_group: GroupId::FOREARM,
                    position_group: GroupId::FOREARM_POSITION,
                    pucks: NodeId::ARM_PUCKS[4..].to_vec(),
                    transform: BlockTransform::from_rows(
                        3,
                        &FOREARM_MPOS2JPOS,
                        &FOREARM_JPOS2MPOS,
                        &FOREARM_JTRQ2MTRQ,
                    ),
                },
            ],
            safety_module: true,
            home_on_init: false,
            tip_link: String::new(),
        }
    }

    /// BH8-280 hand: pucks 11-14, no safety module.
    pub fn bh8_280() -> Self {
        let mut mpos2jpos = [0.0; 16];
        let mut jpos2mpos = [0.0; 16];
        let mut jtrq2mtrq = [0.0; 16];
        for (i, ratio) in HAND_RATIOS.iter().enumerate() {
            mpos2jpos[i * 5] = *ratio;
            jpos2mpos[i * 5] = 1.0 / ratio;
            jtrq2mtrq[i * 5] = -1.0;
        }
        Self {
            name: "bh8_280".to_string(),
            blocks: vec![PuckBlock {
                torque_group: GroupId::HAND,
                position_group: GroupId::HAND_POSITION,
                pucks: NodeId::HAND_PUCKS.to_vec(),
                transform: BlockTransform::from_rows(4, &mpos2jpos, &jpos2mpos, &jtrq2mtrq),
            }],
            safety_module: false,
            home_on_init: true,
            tip_link: String::new(),
        }
    }

    /// Any grouping, for test rigs and non-standard assemblies.
    pub fn custom(name: &str, blocks: Vec<PuckBlock>, safety_module: bool) -> Self {
        Self {
            name: name.to_string(),
            blocks,
            safety_module,
            home_on_init: false,
            tip_link: String::new(),
        }
    }

    pub fn with_tip_link(mut self, tip_link: &str) -> Self {
        self.tip_link = tip_link.to_string();
        self
    }

    pub fn dof(&self) -> usize {
        self.blocks.iter().map(|b| b.pucks.len()).sum()
    }

    pub fn transforms(&self) -> JointTransforms {
        JointTransforms::from_blocks(self.blocks.iter().map(|b| b.transform.clone()).collect())
    }
}

fn upper_arm() -> PuckBlock {
    PuckBlock {
        torque_group: GroupId::UPPER_ARM,
        position_group: GroupId::UPPER_ARM_POSITION,
        pucks: NodeId::ARM_PUCKS[..4].to_vec(),
        transform: BlockTransform::from_rows(
            4,
            &UPPER_ARM_MPOS2JPOS,
            &UPPER_ARM_JPOS2MPOS,
            &UPPER_ARM_JTRQ2MTRQ,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_layouts() {
        let wam7 = DeviceLayout::for_product(ProductKind::Wam7);
        assert_eq!(wam7.dof(), 7);
        assert_eq!(wam7.blocks[1].pucks[0].get(), 5);
        assert!(wam7.safety_module);

        let hand = DeviceLayout::for_product(ProductKind::BarrettHand);
        assert_eq!(hand.dof(), ProductKind::BarrettHand.dof());
        assert!(!hand.safety_module);
        assert!(hand.home_on_init);
        assert!(!wam7.home_on_init);
        assert_eq!(hand.blocks[0].torque_group, GroupId::HAND);
    }

    #[test]
    fn layout_block_sizes_match_transforms() {
        for layout in [DeviceLayout::wam4(), DeviceLayout::wam7(), DeviceLayout::bh8_280()] {
            for block in &layout.blocks {
                assert_eq!(block.pucks.len(), block.transform.dim());
            }
            assert_eq!(layout.transforms().dof(), layout.dof());
        }
    }
}
