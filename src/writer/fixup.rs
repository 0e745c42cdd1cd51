//! Document namescope and forward-reference fixups.

use hashbrown::HashMap;

use crate::model::{MemberRef, TypeRef, Value};
use crate::{Error, Result};

use super::frame::Slot;

/// Names registered with `x:Name`, remembering registration order.
#[derive(Debug, Default)]
pub(crate) struct NameScope {
    names: HashMap<String, (Value, usize)>,
}

impl NameScope {
    pub fn register(&mut self, name: &str, value: Value) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        let order = self.names.len();
        tracing::trace!(name, order, "registered name");
        self.names.insert(name.to_string(), (value, order));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.names.get(name).map(|(value, _)| value.clone())
    }

    fn order(&self, name: &str) -> Result<usize> {
        self.names
            .get(name)
            .map(|(_, order)| *order)
            .ok_or_else(|| Error::UnresolvedReference(name.to_string()))
    }

    pub fn resolve(&self, slot: Slot) -> Result<Value> {
        match slot {
            Slot::Ready(value) => Ok(value),
            Slot::Deferred(name) => self.lookup(&name).ok_or(Error::UnresolvedReference(name)),
        }
    }
}

/// Where a deferred value ends up once its referent exists.
#[derive(Debug)]
pub(crate) enum FixupTarget {
    Member { instance: Value, member: MemberRef },
    Item { collection: Value },
    Entry { dictionary: Value, ty: TypeRef, key: Slot },
}

#[derive(Debug)]
pub(crate) struct Fixup {
    pub target: FixupTarget,
    pub value: Slot,
}

impl Fixup {
    fn needed_names(&self) -> impl Iterator<Item = &str> {
        let key = match &self.target {
            FixupTarget::Entry { key: Slot::Deferred(name), .. } => Some(name.as_str()),
            _ => None,
        };
        let value = match &self.value {
            Slot::Deferred(name) => Some(name.as_str()),
            Slot::Ready(_) => None,
        };
        key.into_iter().chain(value)
    }
}

/// Order fixups by when their last referent became available; fixups
/// waiting on the same referent keep document order.
pub(crate) fn order_by_availability(fixups: Vec<Fixup>, names: &NameScope) -> Result<Vec<Fixup>> {
    let mut ranked = fixups
        .into_iter()
        .enumerate()
        .map(|(seq, fixup)| {
            let available = fixup
                .needed_names()
                .map(|name| names.order(name))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .max()
                .unwrap_or(0);
            Ok((available, seq, fixup))
        })
        .collect::<Result<Vec<_>>>()?;
    ranked.sort_by_key(|(available, seq, _)| (*available, *seq));
    Ok(ranked.into_iter().map(|(_, _, fixup)| fixup).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> Fixup {
        Fixup {
            target: FixupTarget::Item { collection: Value::Null },
            value: Slot::Deferred(name.to_string()),
        }
    }

    #[test]
    fn test_duplicate_name() {
        let mut scope = NameScope::default();
        scope.register("a", Value::Int(1)).unwrap();
        assert!(matches!(scope.register("a", Value::Int(2)), Err(Error::DuplicateName(n)) if n == "a"));
        assert_eq!(scope.lookup("a"), Some(Value::Int(1)));
    }

    #[test]
    fn test_availability_order() {
        let mut scope = NameScope::default();
        scope.register("late", Value::from("late")).unwrap();
        scope.register("early", Value::from("early")).unwrap();
        // `late` was registered first, so its fixup replays first
        let ordered = order_by_availability(vec![item("early"), item("late"), item("early")], &scope).unwrap();
        let names: Vec<_> = ordered
            .iter()
            .map(|f| match &f.value {
                Slot::Deferred(n) => n.as_str(),
                Slot::Ready(_) => "",
            })
            .collect();
        assert_eq!(names, vec!["late", "early", "early"]);
    }

    #[test]
    fn test_unresolved_reference() {
        let scope = NameScope::default();
        let err = order_by_availability(vec![item("ghost")], &scope).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(n) if n == "ghost"));
    }
}
