use facet::Facet;

/// Errors that can occur while diffing two expression trees.
///
/// Every variant means an input tree does not fit its kinds' argument
/// schemas. Both trees are checked before any matching, so a failed diff
/// never produces partial output.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum DiffError {
    /// leaf kind {kind} cannot hold child expression in `{slot}`
    LeafWithChildren { kind: String, slot: String },

    /// {kind} has no argument named `{slot}`
    UnknownArg { kind: String, slot: String },

    /// {kind} sets argument `{slot}` more than once
    DuplicateArg { kind: String, slot: String },

    /// {kind} is missing required argument `{slot}`
    MissingArg { kind: String, slot: String },

    /// {kind} argument `{slot}` takes a single value, got a list
    ListInScalarSlot { kind: String, slot: String },
}
