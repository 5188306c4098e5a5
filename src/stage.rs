/// A payload tagged with the index of the next stage to apply.
///
/// Ownership moves wholesale at every queue handoff; nothing mutates an
/// item once it has been created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T> {
    payload: T,
    stage: usize,
}

impl<T> WorkItem<T> {
    /// A fresh submission, bound for the first stage
    pub fn new(payload: T) -> Self {
        Self { payload, stage: 0 }
    }

    /// An item bound for `stage`
    pub fn at_stage(payload: T, stage: usize) -> Self {
        Self { payload, stage }
    }

    /// Get the index of the next stage to apply
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Get a reference to the payload
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Take the payload out of the item
    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// One transformation step of a chain.
///
/// Stages are shared by every worker, so `apply` takes `&self` and must be
/// safe to call concurrently. A stage has no error channel; a stage that
/// wants to signal failure encodes it in its output value. Any
/// `Fn(T) -> T + Send + Sync` closure is a stage.
pub trait Stage<T>: Send + Sync {
    /// Transform one payload
    fn apply(&self, input: T) -> T;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

impl<T, F> Stage<T> for F
where
    F: Fn(T) -> T + Send + Sync,
{
    fn apply(&self, input: T) -> T {
        self(input)
    }
}

/// A closure stage carrying a name for logs and metrics
pub struct NamedStage<F> {
    name: String,
    mapper: F,
}

impl<F> NamedStage<F> {
    /// Create a new named stage
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
        }
    }
}

impl<T, F> Stage<T> for NamedStage<F>
where
    F: Fn(T) -> T + Send + Sync,
{
    fn apply(&self, input: T) -> T {
        (self.mapper)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for NamedStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedStage").field("name", &self.name).finish()
    }
}

/// Identity stage, mostly useful in tests and benchmarks
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughStage;

impl<T> Stage<T> for PassthroughStage {
    fn apply(&self, input: T) -> T {
        input
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
