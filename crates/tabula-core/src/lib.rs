//! # Tabula Core
//!
//! Typed tabular data: variables with stable identity, domains that order
//! them, examples (rows) that either own their values or point into a
//! table, and tables whose storage is shared between views.
//!
//! Statistics ([`Distribution`], [`Contingency`], [`BasicAttrStat`]) are
//! computed by scanning a table once and keep no link back to it.
//!
//! ## Architecture
//!
//! ```text
//! VariableRegistry      ← Reuses variables across independently built schemas
//!     │
//! Variable              ← Name, kind, labels; identity by handle
//!     │
//! Domain                ← Ordered attributes, optional class, meta attributes
//!     │
//! Example               ← Owning row, or indirect reference into a table
//!     │
//! Table                 ← Shared RowStore + private row list, views, locking
//!     │
//! Distribution          ← Frequency snapshots over one or two variables
//! ```

pub mod buffer;
pub mod contingency;
pub mod distribution;
pub mod domain;
pub mod error;
pub mod example;
pub mod filter;
pub mod hash;
pub mod key;
pub mod registry;
pub mod sampling;
pub mod stat;
pub mod table;
pub mod value;
pub mod variable;

mod lock;
mod storage;

pub use buffer::NumericBuffer;
pub use contingency::{Contingency, DomainContingency};
pub use distribution::{ContDistribution, DiscDistribution, Distribution, DomainDistributions};
pub use domain::{ClassSpec, Domain, MetaDescriptor, MetaId, Scope, Slot};
pub use error::{DataError, ErrorKind, Result};
pub use example::{Example, ReferenceType, RowId};
pub use filter::{CompareOp, Filter};
pub use hash::ContentHash;
pub use key::Key;
pub use registry::{MakeStatus, VariableRegistry, VariableRequest};
pub use sampling::{RandomIndices2, RandomIndicesCv, RandomIndicesN, Stratification};
pub use stat::{BasicAttrStat, DomainBasicAttrStat};
pub use table::{ChecksumParts, RowRecord, RowSelector, Table};
pub use value::Value;
pub use variable::{ComputeValue, VarId, VarKind, Variable, VariableBuilder};
