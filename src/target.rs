use std::any::{TypeId, type_name};

use parse_display::Display;

/// Identity of a component type.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{name}")]
pub struct TargetId {
    type_id: TypeId,
    name: &'static str,
}
impl TargetId {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Identity of a render invocation: the component and the props it was rendered with.
#[derive(Debug, Clone)]
pub struct Target<P> {
    pub id: TargetId,
    pub props: P,
}
impl<P> Target<P> {
    pub fn new(id: TargetId, props: P) -> Self {
        Self { id, props }
    }
    pub fn of<T: ?Sized + 'static>(props: P) -> Self {
        Self::new(TargetId::of::<T>(), props)
    }
}
