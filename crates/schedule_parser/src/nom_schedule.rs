use nom::{
    bytes::complete::take_while,
    character::complete::{self, line_ending, multispace0, space0, space1},
    combinator::opt,
    multi::{many1, separated_list0},
    sequence::{delimited, preceded},
    IResult,
};

use crate::{
    nom_expression::nom_expression, nom_schedule_opts::nom_schedule_opts,
    nom_schedule_payload::nom_schedule_payload, nom_task_identifier::nom_task_identifier, Schedule,
};

fn schedule_line(input: &str) -> IResult<&str, Option<Schedule>> {
    let (input, recurrence) = preceded(space0, nom_expression)(input)?;

    let (input, task_identifier) = preceded(space1, nom_task_identifier)(input)?;
    let (input, options) = opt(preceded(space1, nom_schedule_opts))(input)?;
    let (input, payload) = opt(preceded(space1, nom_schedule_payload))(input)?;

    Ok((
        input,
        Some(Schedule {
            recurrence,
            task_identifier,
            options: options.unwrap_or_default(),
            payload,
        }),
    ))
}

fn schedule_comment(input: &str) -> IResult<&str, Option<Schedule>> {
    let (input, _) = preceded(
        preceded(space0, complete::char('#')),
        take_while(|c: char| c != '\n' && c != '\r'),
    )(input)?;

    Ok((input, None))
}

pub(crate) fn nom_schedule(input: &str) -> IResult<&str, Vec<Schedule>> {
    let (input, schedules) = delimited(
        multispace0,
        separated_list0(
            many1(preceded(space0, line_ending)),
            nom::branch::alt((schedule_comment, schedule_line)),
        ),
        multispace0,
    )(input)?;

    Ok((input, schedules.into_iter().flatten().collect()))
}
