#[derive(Debug, Clone, Copy)]
pub enum ExprPart {
    Minute,
    Hour,
    Day,
    Month,
    DayOfWeek,
}

impl ExprPart {
    pub fn boundaries(&self) -> (u32, u32) {
        match self {
            ExprPart::Minute => (0, 59),
            ExprPart::Hour => (0, 23),
            ExprPart::Day => (1, 31),
            ExprPart::Month => (1, 12),
            ExprPart::DayOfWeek => (0, 6),
        }
    }
}

/// One interpreted field of a five field expression.
///
/// Ranges, lists and anything out of bounds land on `Other`: still valid
/// syntax, but not a shape the reducer knows how to turn into an interval.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExprField {
    Any,
    Step(u32),
    Number(u32),
    Other,
}
