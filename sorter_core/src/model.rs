//! Evaluator for decision trees exported as JSON.

use sorter_config::{TreeDocument, TreeNode};
use sorter_traits::{BeanModel, BoxError};

use crate::error::SorterError;

const FEATURES: usize = 4;

/// A validated decision tree over (r, g, b, weight). Class 1 is a good bean.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTreeModel {
    nodes: Vec<TreeNode>,
}

impl DecisionTreeModel {
    /// Validate a parsed tree. Children must come strictly after their parent,
    /// which also rules out cycles.
    pub fn from_document(doc: &TreeDocument) -> Result<Self, SorterError> {
        if doc.nodes.is_empty() {
            return Err(SorterError::Model("decision tree has no nodes".into()));
        }
        let n = doc.nodes.len();
        for (i, node) in doc.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURES {
                        return Err(SorterError::Model(format!(
                            "node {i}: feature {feature} out of range (0..{FEATURES})"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(SorterError::Model(format!(
                            "node {i}: threshold must be finite"
                        )));
                    }
                    for child in [left, right] {
                        if child <= i || child >= n {
                            return Err(SorterError::Model(format!(
                                "node {i}: child {child} must be in {}..{n}",
                                i + 1
                            )));
                        }
                    }
                }
                TreeNode::Leaf { class } => {
                    if class > 1 {
                        return Err(SorterError::Model(format!(
                            "node {i}: class {class} is not 0 or 1"
                        )));
                    }
                }
            }
        }
        Ok(Self {
            nodes: doc.nodes.clone(),
        })
    }

    pub fn load(path: &std::path::Path) -> eyre::Result<Self> {
        let doc = sorter_config::load_tree_json(path)?;
        Ok(Self::from_document(&doc)?)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn evaluate(&self, x: [f64; FEATURES]) -> u8 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                TreeNode::Leaf { class } => return class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

impl BeanModel for DecisionTreeModel {
    fn predict(&self, r: f64, g: f64, b: f64, weight: f64) -> Result<u8, BoxError> {
        Ok(self.evaluate([r, g, b, weight]))
    }
}
