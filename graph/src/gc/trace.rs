use crate::formula::FormulaId;

/// Visits every formula id a value refers to.
///
/// A formula's static dependencies are exactly the ids its `trace()` hands to
/// the tracer, so `#[derive(Trace)]` on [`Formula`](crate::Formula) is the
/// default dependency extractor of a [`FormulaGraph`](super::FormulaGraph).
///
/// Unlike a heap tracer, skipping or repeating an id here is never unsound:
/// a missing id only means one edge fewer, a repeated id collapses into the
/// same edge.
pub trait Trace {
    /// call `tracer_fn` for every formula id held by this value
    fn trace(&self, tracer_fn: &mut TracerFn);
}

/// A `TracerFn` is a callback invoked for each [`FormulaId`] reachable from
/// a value.
pub type TracerFn<'a> = dyn FnMut(&FormulaId) + 'a;

impl Trace for FormulaId {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        tracer_fn(self)
    }
}

impl Trace for () {
    #[inline]
    fn trace(&self, _tracer_fn: &mut TracerFn) {}
}

impl<T: Trace> Trace for Option<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        if let Some(v) = self {
            v.trace(tracer_fn);
        }
    }
}

impl<T> Trace for [T]
where
    T: Trace,
{
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        for elem in self {
            elem.trace(tracer_fn);
        }
    }
}

impl<T> Trace for Vec<T>
where
    T: Trace,
{
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.as_slice().trace(tracer_fn)
    }
}

impl<A: Trace, B: Trace> Trace for (A, B) {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.0.trace(tracer_fn);
        self.1.trace(tracer_fn);
    }
}
