use nom::{bytes::complete::take_while1, IResult};

pub(crate) fn nom_schedule_payload(input: &str) -> IResult<&str, serde_json::Value> {
    let (input, json) = take_while1(|c: char| c != '\n' && c != '\r')(input)?;

    let json: serde_json::Value = json5::from_str(json)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Fail)))?;

    Ok((input, json))
}
