//! Motor-space / joint-space transforms.
//!
//! Each puck group drives a mechanically coupled set of joints (the upper
//! arm's differential, the wrist's), so the transforms are block-diagonal
//! with one block per group. They are fixed at construction.

use nalgebra::{DMatrix, DVector};
use std::f64::consts::TAU;
use std::ops::Range;
use wam_common::error::WamError;

/// Transforms for one coupled block of joints.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTransform {
    mpos2jpos: DMatrix<f64>,
    jpos2mpos: DMatrix<f64>,
    jtrq2mtrq: DMatrix<f64>,
}

impl BlockTransform {
    /// # Errors
    /// `LengthMismatch` unless all three matrices are square and the same
    /// size.
    pub fn new(
        mpos2jpos: DMatrix<f64>,
        jpos2mpos: DMatrix<f64>,
        jtrq2mtrq: DMatrix<f64>,
    ) -> Result<Self, WamError> {
        let n = mpos2jpos.nrows();
        for m in [&mpos2jpos, &jpos2mpos, &jtrq2mtrq] {
            if m.nrows() != n || m.ncols() != n {
                return Err(WamError::LengthMismatch {
                    expected: n * n,
                    actual: m.nrows() * m.ncols(),
                });
            }
        }
        Ok(Self {
            mpos2jpos,
            jpos2mpos,
            jtrq2mtrq,
        })
    }

    /// Build from row-major `n x n` tables. Panics on a wrong-sized table,
    /// so only for the factory constants.
    pub(crate) fn from_rows(n: usize, mpos2jpos: &[f64], jpos2mpos: &[f64], jtrq2mtrq: &[f64]) -> Self {
        Self {
            mpos2jpos: DMatrix::from_row_slice(n, n, mpos2jpos),
            jpos2mpos: DMatrix::from_row_slice(n, n, jpos2mpos),
            jtrq2mtrq: DMatrix::from_row_slice(n, n, jtrq2mtrq),
        }
    }

    /// Uncoupled joints with a common ratio: `joint = scale * motor`.
    pub fn scaled_identity(n: usize, scale: f64) -> Self {
        Self {
            mpos2jpos: DMatrix::identity(n, n) * scale,
            jpos2mpos: DMatrix::identity(n, n) / scale,
            jtrq2mtrq: DMatrix::identity(n, n) * scale,
        }
    }

    pub fn dim(&self) -> usize {
        self.mpos2jpos.nrows()
    }
}

/// Which transform to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Map {
    MotorToJointPosition,
    JointToMotorPosition,
    JointToMotorTorque,
}

/// Block-diagonal transforms for a whole device.
#[derive(Debug, Clone)]
pub struct JointTransforms {
    blocks: Vec<BlockTransform>,
    ranges: Vec<Range<usize>>,
    dof: usize,
}

impl JointTransforms {
    pub fn from_blocks(blocks: Vec<BlockTransform>) -> Self {
        let mut ranges = Vec::with_capacity(blocks.len());
        let mut start = 0;
        for block in &blocks {
            ranges.push(start..start + block.dim());
            start += block.dim();
        }
        Self {
            blocks,
            ranges,
            dof: start,
        }
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Joint index range of each block.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Full block-diagonal motor-to-joint position matrix.
    pub fn mpos2jpos(&self) -> DMatrix<f64> {
        let mut full = DMatrix::zeros(self.dof, self.dof);
        for (block, range) in self.blocks.iter().zip(&self.ranges) {
            full.view_mut((range.start, range.start), (range.len(), range.len()))
                .copy_from(&block.mpos2jpos);
        }
        full
    }

    /// Motor positions of one block to its joint positions.
    pub fn motor_to_joint_block(&self, block: usize, motor: &[f64]) -> Result<Vec<f64>, WamError> {
        self.apply_block(Map::MotorToJointPosition, block, motor)
    }

    pub fn motor_to_joint_positions(&self, motor: &[f64]) -> Result<Vec<f64>, WamError> {
        self.apply(Map::MotorToJointPosition, motor)
    }

    pub fn joint_to_motor_positions(&self, joints: &[f64]) -> Result<Vec<f64>, WamError> {
        self.apply(Map::JointToMotorPosition, joints)
    }

    pub fn joint_to_motor_torques(&self, joints: &[f64]) -> Result<Vec<f64>, WamError> {
        self.apply(Map::JointToMotorTorque, joints)
    }

    /// Joint travel covered by one motor revolution: `|diag(mpos2jpos)| * 2pi`.
    pub fn resolver_ranges(&self) -> Vec<f64> {
        self.blocks
            .iter()
            .flat_map(|b| b.mpos2jpos.diagonal().iter().map(|d| d.abs() * TAU).collect::<Vec<_>>())
            .collect()
    }

    fn apply(&self, map: Map, input: &[f64]) -> Result<Vec<f64>, WamError> {
        if input.len() != self.dof {
            return Err(WamError::LengthMismatch {
                expected: self.dof,
                actual: input.len(),
            });
        }
        let mut out = Vec::with_capacity(self.dof);
        for (i, range) in self.ranges.iter().enumerate() {
            out.extend(self.apply_block(map, i, &input[range.clone()])?);
        }
        Ok(out)
    }

    fn apply_block(&self, map: Map, block: usize, input: &[f64]) -> Result<Vec<f64>, WamError> {
        let Some(b) = self.blocks.get(block) else {
            return Err(WamError::LengthMismatch {
                expected: self.blocks.len(),
                actual: block + 1,
            });
        };
        if input.len() != b.dim() {
            return Err(WamError::LengthMismatch {
                expected: b.dim(),
                actual: input.len(),
            });
        }
        let matrix = match map {
            Map::MotorToJointPosition => &b.mpos2jpos,
            Map::JointToMotorPosition => &b.jpos2mpos,
            Map::JointToMotorTorque => &b.jtrq2mtrq,
        };
        let v = matrix * DVector::from_column_slice(input);
        Ok(v.iter().copied().collect())
    }
}
