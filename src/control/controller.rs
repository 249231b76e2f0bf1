/// Pure continue/stop decisions for one loop invocation.
///
/// Holds only the invocation's fixed inputs: whether a trip count and a
/// condition are in use, the trip count itself, and the caller-supplied
/// initial condition. The evolving condition produced by the body is passed
/// in by the driver as `latest`; the controller has no side effects.
///
/// With neither a trip count nor a condition the loop is unconditionally
/// infinite. That is a legal configuration and is deliberately not
/// special-cased; avoiding it is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopController {
    has_trip_count: bool,
    has_condition: bool,
    max_trip_count: i64,
    initial_condition: bool,
}

impl LoopController {
    pub fn new(
        has_trip_count: bool,
        has_condition: bool,
        max_trip_count: i64,
        initial_condition: bool,
    ) -> Self {
        Self {
            has_trip_count,
            has_condition,
            max_trip_count,
            initial_condition,
        }
    }

    /// Whether iteration `i` is within the trip-count bound.
    #[inline]
    pub fn valid_iter_num(&self, i: i64) -> bool {
        !self.has_trip_count || i < self.max_trip_count
    }

    /// Whether the condition holds going into iteration `i`.
    ///
    /// At `i == 0` this is the caller-supplied initial condition; afterwards
    /// it is `latest`, the condition produced by the previous body run.
    #[inline]
    pub fn condition_true(&self, i: i64, latest: bool) -> bool {
        match (self.has_condition, i) {
            (false, _) => true,
            (true, 0) => self.initial_condition,
            (true, _) => latest,
        }
    }

    /// The continue predicate: iteration `i` executes only if both the
    /// trip-count bound and the condition hold.
    #[inline]
    pub fn proceed(&self, i: i64, latest: bool) -> bool {
        self.valid_iter_num(i) && self.condition_true(i, latest)
    }
}
