//! Class registry for named class definitions

use rustc_hash::FxHashMap;

use crate::class::{Class, ClassId};
use crate::{ObjectError, ObjectResult};

/// Append-only registry of named classes
///
/// Classes are immutable once composed, so the registry only ever grows:
/// redefining a name is rejected and a new class must be extended under a
/// different name instead.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Classes in registration order
    classes: Vec<Class>,
    /// Class name to position mapping
    name_to_index: FxHashMap<String, usize>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named class. Returns its position in the registry.
    pub fn register_class(&mut self, class: Class) -> ObjectResult<usize> {
        let name = match class.name() {
            Some(name) => name.to_string(),
            None => {
                return Err(ObjectError::InvalidDeclaration {
                    name: class.display_name().to_string(),
                    reason: "only named classes can be registered".to_string(),
                })
            }
        };
        if self.name_to_index.contains_key(&name) {
            return Err(ObjectError::InvalidDeclaration {
                name,
                reason: "a class with this name is already registered".to_string(),
            });
        }

        let index = self.classes.len();
        self.classes.push(class);
        self.name_to_index.insert(name, index);
        Ok(index)
    }

    /// Get class by position
    pub fn get(&self, index: usize) -> Option<&Class> {
        self.classes.get(index)
    }

    /// Get class by name
    pub fn get_class_by_name(&self, name: &str) -> Option<&Class> {
        self.name_to_index
            .get(name)
            .and_then(|index| self.classes.get(*index))
    }

    /// Get class by its class id
    pub fn get_class_by_id(&self, id: ClassId) -> Option<&Class> {
        self.classes.iter().find(|class| class.id() == id)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over all classes in registration order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Class)> {
        self.classes.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixin::Mixin;

    fn named(name: &str) -> Class {
        Class::core_object()
            .extend_named(name, [Mixin::builder().value("kind", name).build()])
            .unwrap()
    }

    #[test]
    fn test_register_class() {
        let mut registry = ClassRegistry::new();
        assert_eq!(registry.register_class(named("Point")).unwrap(), 0);
        assert_eq!(registry.register_class(named("Circle")).unwrap(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_class_by_name() {
        let mut registry = ClassRegistry::new();
        let point = named("Point");
        registry.register_class(point.clone()).unwrap();

        assert!(registry.get_class_by_name("Point").unwrap().ptr_eq(&point));
        assert!(registry.get_class_by_id(point.id()).unwrap().ptr_eq(&point));
        assert!(registry.get_class_by_name("Circle").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ClassRegistry::new();
        registry.register_class(named("Point")).unwrap();

        assert!(matches!(
            registry.register_class(named("Point")),
            Err(ObjectError::InvalidDeclaration { ref name, .. }) if name == "Point"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_anonymous_class_rejected() {
        let mut registry = ClassRegistry::new();
        let anonymous = Class::core_object().extend([]).unwrap();
        assert!(registry.register_class(anonymous).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_iter_in_registration_order() {
        let mut registry = ClassRegistry::new();
        registry.register_class(named("A")).unwrap();
        registry.register_class(named("B")).unwrap();

        let names: Vec<_> = registry.iter().map(|(_, class)| class.display_name().to_string()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(registry.get(1).and_then(Class::name), Some("B"));
    }
}
