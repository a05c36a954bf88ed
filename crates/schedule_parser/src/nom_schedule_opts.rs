use nom::{bytes::complete::take_while1, character::complete::char, sequence::preceded, IResult};

use jobscout_schedule_types::ScheduleOptions;

/// Parses `?key=value&key=value` options in HTTP query string syntax
pub(crate) fn nom_schedule_opts(input: &str) -> IResult<&str, ScheduleOptions> {
    let (input, qs) = preceded(char('?'), take_while1(|c: char| !c.is_whitespace()))(input)?;

    let options = serde_qs::from_str(qs).map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Fail))
    })?;

    Ok((input, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_query() {
        let input = "?max=5&priority=-4 foo";
        assert_eq!(
            Ok((
                " foo",
                ScheduleOptions {
                    max: Some(5),
                    priority: Some(-4),
                    ..Default::default()
                }
            )),
            nom_schedule_opts(input)
        );

        let input = "?id=weekly_digest bar";
        assert_eq!(
            Ok((
                " bar",
                ScheduleOptions {
                    id: Some(String::from("weekly_digest")),
                    ..Default::default()
                }
            )),
            nom_schedule_opts(input)
        );
    }

    #[test]
    fn test_query_not_preceded_by_question_mark() {
        let input = "max=5&priority=-4 foo";

        assert!(nom_schedule_opts(input).is_err());
    }

    #[test]
    fn test_query_with_invalid_value() {
        let input = "?max=many foo";

        assert!(nom_schedule_opts(input).is_err());
    }
}
