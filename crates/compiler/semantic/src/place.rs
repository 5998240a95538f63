//! # Places
//!
//! A place is a symbolic path rooted at a local, reachable via field and
//! index steps. The borrow checker tracks live borrows per place.

use drift_compiler_hir::{BindingId, HExpr, HExprKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceKind {
    Local,
}

/// The root of a place: a local binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceBase {
    pub kind: PlaceKind,
    /// Binding id of the root local; unresolved names use `None` and never
    /// alias a real place.
    pub binding_id: Option<BindingId>,
    pub name: String,
}

impl PlaceBase {
    pub fn local(binding_id: Option<BindingId>, name: impl Into<String>) -> Self {
        Self {
            kind: PlaceKind::Local,
            binding_id,
            name: name.into(),
        }
    }
}

/// One projection step away from the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Field(String),
    /// Index projections are not distinguished by index value; all elements
    /// of a base alias conservatively.
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    pub base: PlaceBase,
    pub projections: Vec<Projection>,
}

impl Place {
    pub fn from_base(base: PlaceBase) -> Self {
        Self {
            base,
            projections: Vec::new(),
        }
    }

    /// Resolve an HIR expression to the place it denotes, if any.
    ///
    /// Only variable roots with field/index suffixes form places; rvalues
    /// (calls, literals, arithmetic) do not.
    pub fn of_expr(expr: &HExpr) -> Option<Place> {
        match &expr.kind {
            HExprKind::Var { name, binding_id } => Some(Place::from_base(PlaceBase::local(
                *binding_id,
                name.clone(),
            ))),
            HExprKind::Field { subject, name } => {
                let mut place = Place::of_expr(subject)?;
                place.projections.push(Projection::Field(name.clone()));
                Some(place)
            }
            HExprKind::Index { subject, .. } => {
                let mut place = Place::of_expr(subject)?;
                place.projections.push(Projection::Index);
                Some(place)
            }
            _ => None,
        }
    }

    /// Whether two places may refer to overlapping storage. A place overlaps
    /// itself and any prefix of itself.
    pub fn overlaps(&self, other: &Place) -> bool {
        if self.base != other.base {
            return false;
        }
        let common = self.projections.len().min(other.projections.len());
        self.projections[..common] == other.projections[..common]
    }
}

impl std::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base.name)?;
        for proj in &self.projections {
            match proj {
                Projection::Field(name) => write!(f, ".{name}")?,
                Projection::Index => write!(f, "[_]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_compiler_hir::HirBuilder;

    #[test]
    fn place_overlap_includes_prefixes() {
        let mut b = HirBuilder::new();
        let bid = b.fresh_binding();
        let root = Place::from_base(PlaceBase::local(Some(bid), "x"));
        let mut field = root.clone();
        field.projections.push(Projection::Field("f".to_string()));

        assert!(root.overlaps(&field));
        assert!(field.overlaps(&root));

        let other = Place::from_base(PlaceBase::local(Some(b.fresh_binding()), "y"));
        assert!(!root.overlaps(&other));
    }

    #[test]
    fn sibling_fields_do_not_overlap() {
        let mut b = HirBuilder::new();
        let bid = b.fresh_binding();
        let mut left = Place::from_base(PlaceBase::local(Some(bid), "x"));
        left.projections.push(Projection::Field("a".to_string()));
        let mut right = Place::from_base(PlaceBase::local(Some(bid), "x"));
        right.projections.push(Projection::Field("b".to_string()));
        assert!(!left.overlaps(&right));
    }
}
