use crate::comment::model::{Comment, CommentNode, MAX_DEPTH, ROOT_PARENT_ID};
use crate::utils::error::CustomError;
use log::error;
use std::collections::HashMap;

/// Turns flat comment rows into nested nodes in a single pass.
///
/// Rows must already be in sibling order; grouping keeps that order, so no
/// sorting happens here. Each child group is consumed once, which together
/// with the depth cap keeps corrupt (cyclic or too deep) data from looping.
pub struct TreeAssembler {
    groups: HashMap<i64, Vec<Comment>>,
}

impl TreeAssembler {
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Comment>,
    {
        let mut groups: HashMap<i64, Vec<Comment>> = HashMap::new();
        for row in rows {
            groups.entry(row.parent_id).or_default().push(row);
        }

        TreeAssembler { groups }
    }

    /// Nests every root found in the rows.
    pub fn build(mut self) -> Result<Vec<CommentNode>, CustomError> {
        let roots = self.groups.remove(&ROOT_PARENT_ID).unwrap_or_default();
        self.attach(roots)
    }

    /// Nests the given roots, in the order given, using the grouped rows as
    /// their reply pool.
    pub fn attach(mut self, roots: Vec<Comment>) -> Result<Vec<CommentNode>, CustomError> {
        roots
            .into_iter()
            .map(|root| self.node(root, 0))
            .collect()
    }

    fn node(&mut self, comment: Comment, depth: usize) -> Result<CommentNode, CustomError> {
        let children = self.groups.remove(&comment.id).unwrap_or_default();

        if !children.is_empty() && depth >= MAX_DEPTH {
            error!(
                "Comment {} at depth {} has {} replies; tree is deeper than allowed",
                comment.id,
                depth,
                children.len()
            );
            return Err(CustomError::DataIntegrityError(
                "Comment tree is deeper than allowed".into(),
            ));
        }

        let replies = children
            .into_iter()
            .map(|child| self.node(child, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommentNode { comment, replies })
    }
}
