//! Console command grammar.

use color_eyre::eyre::{self, eyre};
use hyperedit::lander::NudgeInput;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{space0, space1, u32, u64},
    combinator::{all_consuming, map, map_res, opt, rest, value, verify},
    multi::count,
    number::complete::double,
    sequence::{preceded, terminated, tuple},
    Finish, IResult,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Help,
    Status,
    Targets,
    Select(usize),
    Simple {
        body: String,
        altitude: String,
    },
    /// Inclination, eccentricity, semi-major axis, LAN, argument of
    /// periapsis, mean anomaly at epoch, epoch.
    Complex {
        body: String,
        elements: Vec<String>,
    },
    /// Six slider positions followed by the epoch in seconds.
    Graphical(Vec<f64>),
    Velocity {
        direction: String,
        speed: String,
    },
    Rendezvous {
        with: usize,
        lead_time: String,
    },
    Land {
        body: String,
        lat: String,
        lon: String,
        alt: String,
        rotate: bool,
    },
    LandHere,
    Drop,
    Nudge(NudgeInput),
    /// Copy landing coordinates from a vessel, the active one if `None`.
    Copy(Option<usize>),
    Landed,
    Tick(u32),
    Scene(String),
    Save(String),
    Load(Option<String>),
    Delete(String),
    Coords,
    Quit,
}

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn arg(input: &str) -> IResult<&str, String> {
    map(preceded(space1, word), str::to_owned)(input)
}

fn index(input: &str) -> IResult<&str, usize> {
    map_res(preceded(space1, u64), usize::try_from)(input)
}

/// Everything up to the end of the line, e.g. a coordinate name.
fn name(input: &str) -> IResult<&str, String> {
    map(
        preceded(space1, verify(rest, |s: &str| !s.trim().is_empty())),
        |s: &str| s.trim().to_owned(),
    )(input)
}

fn nudge_keys(keys: &str) -> Result<NudgeInput, char> {
    let mut input = NudgeInput::default();
    for c in keys.chars() {
        match c.to_ascii_lowercase() {
            'n' => input.north = true,
            's' => input.south = true,
            'e' => input.east = true,
            'w' => input.west = true,
            other => return Err(other),
        }
    }
    Ok(input)
}

fn orbit_command(input: &str) -> IResult<&str, Command> {
    alt((
        map(preceded(tag("select"), index), Command::Select),
        map(
            preceded(tag("simple"), tuple((arg, arg))),
            |(body, altitude)| Command::Simple { body, altitude },
        ),
        map(
            preceded(tag("complex"), tuple((arg, count(arg, 7)))),
            |(body, elements)| Command::Complex { body, elements },
        ),
        map(
            preceded(tag("graphical"), count(preceded(space1, double), 7)),
            Command::Graphical,
        ),
        map(
            preceded(tag("velocity"), tuple((arg, arg))),
            |(direction, speed)| Command::Velocity { direction, speed },
        ),
        map(
            preceded(tag("rendezvous"), tuple((index, arg))),
            |(with, lead_time)| Command::Rendezvous { with, lead_time },
        ),
    ))(input)
}

fn landing_command(input: &str) -> IResult<&str, Command> {
    alt((
        value(Command::LandHere, tag("land-here")),
        map(
            preceded(
                tag("land"),
                tuple((arg, arg, arg, arg, opt(preceded(space1, tag("free"))))),
            ),
            |(body, lat, lon, alt, free)| Command::Land {
                body,
                lat,
                lon,
                alt,
                rotate: free.is_none(),
            },
        ),
        value(Command::Drop, tag("drop")),
        map(
            preceded(tag("nudge"), map_res(preceded(space1, word), nudge_keys)),
            Command::Nudge,
        ),
        map(preceded(tag("copy"), opt(index)), Command::Copy),
        value(Command::Landed, tag("landed")),
        map(preceded(tag("save"), name), Command::Save),
        map(preceded(tag("load"), opt(name)), Command::Load),
        map(preceded(tag("delete"), name), Command::Delete),
        value(Command::Coords, tag("coords")),
    ))(input)
}

fn session_command(input: &str) -> IResult<&str, Command> {
    alt((
        value(Command::Help, tag("help")),
        value(Command::Status, tag("status")),
        value(Command::Targets, tag("targets")),
        map(
            preceded(tag("tick"), opt(preceded(space1, u32))),
            |n| Command::Tick(n.unwrap_or(1)),
        ),
        map(preceded(tag("scene"), arg), Command::Scene),
        value(Command::Quit, alt((tag("quit"), tag("exit")))),
    ))(input)
}

fn command(input: &str) -> IResult<&str, Command> {
    alt((orbit_command, landing_command, session_command))(input)
}

pub fn parse(line: &str) -> eyre::Result<Command> {
    all_consuming(terminated(command, space0))(line.trim())
        .finish()
        .map(|(_, command)| command)
        .map_err(|e| eyre!("unrecognized command near `{}`", e.input))
}
