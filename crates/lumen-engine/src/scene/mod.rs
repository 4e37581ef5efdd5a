//! Retained-mode scene graph.
//!
//! - [`Scene`] owns every [`Node`] and resolves ids; nodes refer to each other by [`NodeId`] only
//! - node variants form the closed [`NodeKind`] enum
//! - world transforms are derived on demand by the functions in [`transform`]
//! - cross-thread mutation goes through [`SceneEditor`] and is applied at frame start

mod edit;
mod events;
mod graph;
mod id;
mod key;
mod kind;
mod node;
mod serial;
mod z_index;

pub mod transform;

pub use edit::{SceneEdit, SceneEditor};
pub use events::{MouseEventKind, NodeMouseEvent, SceneEvent};
pub use graph::Scene;
pub use id::{NodeId, SceneId};
pub use key::SortKey;
pub use kind::{NodeKind, NodeKindTag};
pub use node::Node;
pub use transform::{world_transform, WorldTransform};
pub use z_index::ZIndex;
