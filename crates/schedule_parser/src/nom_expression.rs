use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{self, char},
    combinator::{all_consuming, map, value, verify},
    sequence::{preceded, terminated},
    IResult,
};

use jobscout_schedule_types::Recurrence;

use crate::types::{ExprField, ExprPart};

/// Grabs one whitespace delimited field made of cron expression characters
fn cron_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || matches!(c, '*' | '/' | ',' | '-'))(input)
}

/// Attempts to parse a number within the part boundaries
fn field_number<'a>(part: ExprPart) -> impl Fn(&'a str) -> IResult<&'a str, u32> {
    let (min, max) = part.boundaries();
    move |input| verify(complete::u32, |v| v >= &min && v <= &max)(input)
}

/// Attempts to parse a `*/n` step; `n` must be positive and within the part maximum
fn field_step<'a>(part: ExprPart) -> impl Fn(&'a str) -> IResult<&'a str, u32> {
    let (_, max) = part.boundaries();
    move |input| preceded(tag("*/"), verify(complete::u32, |v| v >= &1 && v <= &max))(input)
}

/// Interprets one field token.
///
/// The token must look like cron syntax, but only whole numbers, `*` and
/// `*/n` steps are understood; every other token becomes [`ExprField::Other`]
/// so the reducer can fall back instead of rejecting the line.
fn expression_field<'a>(part: ExprPart) -> impl Fn(&'a str) -> IResult<&'a str, ExprField> {
    move |input| {
        let (rest, token) = cron_token(input)?;

        let field = alt((
            map(all_consuming(field_step(part)), ExprField::Step),
            value(ExprField::Any, all_consuming(char('*'))),
            map(all_consuming(field_number(part)), ExprField::Number),
        ))(token)
        .map(|(_, field)| field)
        .unwrap_or(ExprField::Other);

        Ok((rest, field))
    }
}

/// Reduce a five field expression to the nearest supported recurrence.
///
/// Only three shapes are interpreted: a step on the minute field, a step on
/// the hour field and a fixed daily time. Everything else runs hourly.
fn reduce_expression(fields: [ExprField; 5]) -> Recurrence {
    use ExprField::{Any, Number, Step};

    match fields {
        [Step(n), Any, Any, Any, Any] => Recurrence::EveryMinutes(n),
        [Any | Number(_), Step(n), Any, Any, Any] => Recurrence::EveryHours(n),
        [Number(minute), Number(hour), Any, Any, Any] => Recurrence::DailyAt { hour, minute },
        _ => Recurrence::Hourly,
    }
}

/// Parse all 5 expression fields and reduce them
pub(crate) fn nom_expression(input: &str) -> IResult<&str, Recurrence> {
    let (input, minute) = terminated(expression_field(ExprPart::Minute), char(' '))(input)?;
    let (input, hour) = terminated(expression_field(ExprPart::Hour), char(' '))(input)?;
    let (input, day) = terminated(expression_field(ExprPart::Day), char(' '))(input)?;
    let (input, month) = terminated(expression_field(ExprPart::Month), char(' '))(input)?;
    let (input, dow) = expression_field(ExprPart::DayOfWeek)(input)?;

    Ok((input, reduce_expression([minute, hour, day, month, dow])))
}
