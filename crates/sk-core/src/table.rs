use std::sync::Arc;

use crate::alloc::Allocator;
use crate::chain::CreateInfo;
use crate::object::{Object, ObjectKind};
use crate::proc::ProcResolver;
use crate::result::SkResult;

/// A fixed set of named, optional entry points for one object kind.
pub trait DispatchTable: Clone + Default + Send + Sync + 'static {
    /// Symbol names, in slot order.
    const ENTRY_POINTS: &'static [&'static str];

    /// Build a table: start from `previous` (or all-`None`), then overwrite
    /// every slot `resolver` provides. Unresolved slots keep what they had.
    fn build(resolver: &dyn ProcResolver, previous: Option<&Self>) -> Self;

    /// Number of populated slots.
    fn resolved_count(&self) -> usize;

    /// Symbol names of the populated slots.
    fn resolved_names(&self) -> Vec<&'static str>;
}

/// Table types that describe a layered object kind.
pub trait Dispatchable: DispatchTable {
    type CreateInfo: CreateInfo + 'static;

    /// Kind of the terminal node of every chain using this table.
    const KIND: ObjectKind;

    /// Constructor symbol; resolves to a [`CreateFn<Self>`].
    const CREATE_SYMBOL: &'static str;
}

/// Constructor entry point of a layered object kind.
pub type CreateFn<T> = Arc<
    dyn Fn(&<T as Dispatchable>::CreateInfo, &Allocator) -> SkResult<Object<T>> + Send + Sync,
>;

/// Generate a [`DispatchTable`] and one `Arc<dyn Fn>` alias per slot.
///
/// ```ignore
/// dispatch_table! {
///     pub struct ExampleTable {
///         ping: PingFn = "skPing" => fn(&Example) -> SkResult<()>;
///     }
/// }
/// ```
#[macro_export]
macro_rules! dispatch_table {
    (
        $(#[$meta:meta])*
        pub struct $table:ident {
            $(
                $(#[$slot_meta:meta])*
                $slot:ident: $alias:ident = $symbol:literal => fn($($arg:ty),* $(,)?) -> $ret:ty;
            )*
        }
    ) => {
        $(
            $(#[$slot_meta])*
            pub type $alias = ::std::sync::Arc<dyn Fn($($arg),*) -> $ret + Send + Sync>;
        )*

        $(#[$meta])*
        #[derive(Clone, Default)]
        pub struct $table {
            $(
                $(#[$slot_meta])*
                pub $slot: Option<$alias>,
            )*
        }

        impl $crate::DispatchTable for $table {
            const ENTRY_POINTS: &'static [&'static str] = &[$($symbol),*];

            fn build(resolver: &dyn $crate::ProcResolver, previous: Option<&Self>) -> Self {
                let mut table = previous.cloned().unwrap_or_default();
                $(
                    if let Some(proc) = $crate::resolve_as::<$alias>(resolver, $symbol) {
                        table.$slot = Some(proc);
                    }
                )*
                table
            }

            fn resolved_count(&self) -> usize {
                0 $(+ usize::from(self.$slot.is_some()))*
            }

            fn resolved_names(&self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(
                    if self.$slot.is_some() {
                        names.push($symbol);
                    }
                )*
                names
            }
        }

        impl ::std::fmt::Debug for $table {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($table))
                    .field("resolved", &$crate::DispatchTable::resolved_names(self))
                    .finish()
            }
        }
    };
}
