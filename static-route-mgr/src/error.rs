use thiserror::Error;

/// Recoverable errors at this crate's one real boundary: building a
/// [`crate::config::StaticRouteConfig`] out of raw operator input. Everything
/// downstream of a validated config is either a deferred no-op (no feasible
/// nexthop yet) or an invariant breach, and invariant breaches panic rather
/// than return here -- see the crate's module docs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StaticRouteError {
    #[error("invalid static route prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid nexthop address: {0}")]
    InvalidNexthop(String),
}
