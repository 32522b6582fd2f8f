use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::{
    client::Lookup,
    keys::{KeyPool, KeySource},
};

/// Ties together what is looked up and how keys are chosen.
///
/// A scenario says nothing about *how* it runs; that is the job of an
/// [`crate::Executor`].
///
/// ```rust
/// use repstress::{keys::{KeyPool, Selection}, LookupKey, LookupOutcome, Scenario};
/// use std::{sync::Arc, time::Duration};
///
/// let scenario = Scenario::builder()
///     .name("stubbed")
///     .lookup(|_key: LookupKey| async { LookupOutcome::success(Duration::from_millis(1)) })
///     .keys(Arc::new(KeyPool::generated(Selection::Random { seed: Some(7) })))
///     .build();
/// assert_eq!(scenario.name, "stubbed");
/// ```
#[derive(Clone, TypedBuilder)]
pub struct Scenario<L>
where
    L: Lookup,
{
    #[builder(setter(into))]
    pub name: String,
    pub lookup: L,
    #[builder(default = Arc::new(KeyPool::default()) as Arc<dyn KeySource>)]
    pub keys: Arc<dyn KeySource>,
}
