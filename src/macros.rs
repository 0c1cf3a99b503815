macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!([]);
        $name!([T1]);
        $name!([T1, T2]);
        $name!([T1, T2, T3]);
        $name!([T1, T2, T3, T4]);
        $name!([T1, T2, T3, T4, T5]);
        $name!([T1, T2, T3, T4, T5, T6]);
        $name!([T1, T2, T3, T4, T5, T6, T7]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12]);
    };
}

/// Implements [`crate::Upcast`] from an implementation type to a `dyn Trait` contract.
///
/// # Syntax
/// ```text
/// upcast!(Implementation => dyn Contract [+ Send + Sync ...])
/// ```
///
/// # Examples
/// ```rust
/// use scopedi::upcast;
///
/// trait UserRepo: Send + Sync {}
///
/// struct PostgresUserRepo;
///
/// impl UserRepo for PostgresUserRepo {}
///
/// upcast!(PostgresUserRepo => dyn UserRepo);
/// ```
#[macro_export]
macro_rules! upcast {
    ($implementation:ty => $contract:ty) => {
        impl $crate::Upcast<$contract> for $implementation {
            #[inline]
            fn upcast(self: $crate::__private::Arc<Self>) -> $crate::__private::Arc<$contract> {
                self
            }
        }
    };
}
