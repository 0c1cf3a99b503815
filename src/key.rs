use alloc::{boxed::Box, vec::Vec};
use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Widest generic contract supported by the specializer.
pub const MAX_GENERIC_ARITY: usize = 8;

/// Identity of an unspecialized generic contract or implementation,
/// e.g. `Pair<_, _>` is `GenericShape::new("Pair", 2)`.
///
/// Shapes compare by name and arity, so the name should be unique within a registry
/// (`concat!(module_path!(), "::Pair")` is a good choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericShape {
    pub name: &'static str,
    pub arity: usize,
}

impl GenericShape {
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

impl Display for GenericShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.name)?;
        for index in 0..self.arity {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "T{index}")?;
        }
        f.write_str(">")
    }
}

/// Identity of a requested contract.
///
/// Keys compare structurally: two generic keys are equal when their shapes and every argument are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceKey {
    Type(TypeInfo),
    Generic { shape: GenericShape, arguments: Box<[ServiceKey]> },
}

impl ServiceKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeInfo::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn generic(shape: GenericShape, arguments: impl Into<Box<[ServiceKey]>>) -> Self {
        Self::Generic {
            shape,
            arguments: arguments.into(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_generic(&self) -> bool {
        matches!(self, Self::Generic { .. })
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(type_info) => Display::fmt(type_info, f),
            Self::Generic { shape, arguments } => {
                write!(f, "{}<", shape.name)?;
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(argument, f)?;
                }
                f.write_str(">")
            }
        }
    }
}

/// An ordered list of types, implemented for tuples.
pub trait TypeList {
    fn keys() -> Vec<ServiceKey>;
}

macro_rules! impl_type_list {
    (
        [$($ty:ident),*]
    ) => {
        impl<$($ty: 'static,)*> TypeList for ($($ty,)*) {
            #[inline]
            fn keys() -> Vec<ServiceKey> {
                Vec::from([$(ServiceKey::of::<$ty>(),)*])
            }
        }
    };
}

all_the_tuples!(impl_type_list);

/// A closed instantiation of a generic contract.
///
/// # Examples
/// ```rust
/// use scopedi::{GenericContract, GenericShape};
///
/// trait Pair<A, B>: Send + Sync {}
///
/// impl<A: Send + Sync + 'static, B: Send + Sync + 'static> GenericContract for dyn Pair<A, B> {
///     const SHAPE: GenericShape = GenericShape::new("Pair", 2);
///     type Arguments = (A, B);
/// }
/// ```
pub trait GenericContract: Send + Sync + 'static {
    const SHAPE: GenericShape;
    type Arguments: TypeList;

    #[inline]
    #[must_use]
    fn key() -> ServiceKey {
        ServiceKey::generic(Self::SHAPE, Self::Arguments::keys())
    }
}

/// Type arguments of one generic instantiation, already mapped onto the implementation's own parameters.
#[derive(Debug, Clone, Copy)]
pub struct TypeArguments<'a>(pub(crate) &'a [ServiceKey]);

impl<'a> TypeArguments<'a> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'a ServiceKey> {
        self.0.get(index)
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &'a [ServiceKey] {
        self.0
    }

    /// Checks whether the arguments are exactly the types of `L`, in order.
    #[inline]
    #[must_use]
    pub fn is<L: TypeList>(&self) -> bool {
        self.0 == L::keys().as_slice()
    }
}
