// SPDX-License-Identifier: MIT OR Apache-2.0
//! Free-floating comments placed on the canvas next to the nodes.

use crate::ids::IdGenerator;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Size of a fresh comment
pub const DEFAULT_COMMENT_SIZE: [f32; 2] = [200.0, 30.0];

/// Comment background colours
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentColor {
    /// Blue
    #[default]
    Blue,
    /// Red
    Red,
    /// Purple
    Purple,
    /// Green
    Green,
    /// Orange
    Orange,
    /// Yellow
    Yellow,
    /// Pink
    Pink,
}

/// A comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Unique ID
    pub id: String,
    /// Body text
    pub text: String,
    /// Horizontal position
    pub x: f32,
    /// Vertical position
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Background colour
    pub color: CommentColor,
    /// Just created and not yet edited
    #[serde(default)]
    pub is_new: bool,
}

/// Comments by ID
pub type Comments = IndexMap<String, Comment>;

/// Comment actions
#[derive(Debug, Clone, PartialEq)]
pub enum CommentAction {
    /// Create a comment at a position
    AddComment {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Clear the just-created flag
    RemoveCommentNew {
        /// Comment ID
        id: String,
    },
    /// Move a comment
    SetCommentCoordinates {
        /// Comment ID
        id: String,
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Resize a comment
    SetCommentDimensions {
        /// Comment ID
        id: String,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
    /// Replace the text
    SetCommentText {
        /// Comment ID
        id: String,
        /// New text
        text: String,
    },
    /// Recolour a comment
    SetCommentColor {
        /// Comment ID
        id: String,
        /// New colour
        color: CommentColor,
    },
    /// Delete a comment
    DeleteComment {
        /// Comment ID
        id: String,
    },
}

/// Apply a comment action. Actions naming an unknown comment change nothing.
pub fn comment_transition(comments: &Comments, action: CommentAction, ids: &mut dyn IdGenerator) -> Comments {
    let mut next = comments.clone();
    match action {
        CommentAction::AddComment { x, y } => {
            let id = ids.next_id();
            let [width, height] = DEFAULT_COMMENT_SIZE;
            next.insert(
                id.clone(),
                Comment {
                    id,
                    text: String::new(),
                    x,
                    y,
                    width,
                    height,
                    color: CommentColor::default(),
                    is_new: true,
                },
            );
        }
        CommentAction::RemoveCommentNew { id } => {
            if let Some(comment) = next.get_mut(&id) {
                comment.is_new = false;
            }
        }
        CommentAction::SetCommentCoordinates { id, x, y } => {
            if let Some(comment) = next.get_mut(&id) {
                comment.x = x;
                comment.y = y;
            }
        }
        CommentAction::SetCommentDimensions { id, width, height } => {
            if let Some(comment) = next.get_mut(&id) {
                comment.width = width;
                comment.height = height;
            }
        }
        CommentAction::SetCommentText { id, text } => {
            if let Some(comment) = next.get_mut(&id) {
                comment.text = text;
            }
        }
        CommentAction::SetCommentColor { id, color } => {
            if let Some(comment) = next.get_mut(&id) {
                comment.color = color;
            }
        }
        CommentAction::DeleteComment { id } => {
            next.shift_remove(&id);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;

    #[test]
    fn test_comment_lifecycle() {
        let mut ids = SequentialIds::new("c");
        let comments = comment_transition(&Comments::new(), CommentAction::AddComment { x: 1.0, y: 2.0 }, &mut ids);
        let comment = &comments["c1"];
        assert!(comment.is_new);
        assert_eq!((comment.width, comment.height), (200.0, 30.0));
        assert_eq!(comment.color, CommentColor::Blue);

        let comments = comment_transition(
            &comments,
            CommentAction::SetCommentText {
                id: "c1".to_string(),
                text: "Mixes the inputs".to_string(),
            },
            &mut ids,
        );
        let comments = comment_transition(&comments, CommentAction::RemoveCommentNew { id: "c1".to_string() }, &mut ids);
        let comments = comment_transition(
            &comments,
            CommentAction::SetCommentColor {
                id: "c1".to_string(),
                color: CommentColor::Green,
            },
            &mut ids,
        );
        let comment = &comments["c1"];
        assert_eq!(comment.text, "Mixes the inputs");
        assert!(!comment.is_new);
        assert_eq!(comment.color, CommentColor::Green);

        let comments = comment_transition(&comments, CommentAction::DeleteComment { id: "c1".to_string() }, &mut ids);
        assert!(comments.is_empty());
    }

    #[test]
    fn test_unknown_comment_is_ignored() {
        let mut ids = SequentialIds::new("c");
        let comments = comment_transition(&Comments::new(), CommentAction::AddComment { x: 0.0, y: 0.0 }, &mut ids);
        let unchanged = comment_transition(
            &comments,
            CommentAction::SetCommentDimensions {
                id: "ghost".to_string(),
                width: 1.0,
                height: 1.0,
            },
            &mut ids,
        );
        assert_eq!(unchanged, comments);
    }
}
