//! laneguard Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every laneguard component:
//! - Identifiers (NodeId, IncidentId)
//! - Geometry input (Point, Polygon, Coordinates)
//! - Roadway model (Lane, LanePolygon, Node, Incident)
//! - Operator decisions and roadside display payloads
//! - The tagged error type

pub mod id;
pub mod geo;
pub mod node;
pub mod incident;
pub mod decision;
pub mod error;

pub use id::*;
pub use geo::*;
pub use node::*;
pub use incident::*;
pub use decision::*;
pub use error::*;
