//! File names for replays copied into session storage

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Default replay file name format
pub const DEFAULT_REPLAY_FILE_FORMAT: &str = "{map}_{score}_{player}.Replay.Gbx";

static FORMAT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:[0-9a-fA-F]{1,3}|[lhpLHP](?:\[[^\]]*\])?|[wnoitsgzmWNOITSGZM<>]|.)")
        .expect("Valid regex pattern")
});

static SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s_\-.()\[\]']").expect("Valid regex pattern"));

/// Strip `$` formatting codes; `$$` stands for a literal dollar sign
pub fn deformat(text: &str) -> String {
    text.split("$$")
        .map(|part| FORMAT_CODE.replace_all(part, "").into_owned())
        .collect::<Vec<_>>()
        .join("$")
}

/// Race time as `m'ss''hh`
pub fn format_score(time: Duration) -> String {
    let hundredths = time.as_millis() / 10;
    let minutes = hundredths / 6000;
    let seconds = (hundredths / 100) % 60;
    format!("{minutes}'{seconds:02}''{:02}", hundredths % 100)
}

/// Drop characters file systems refuse
pub fn clear_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

/// Build the replay file name from the configured format
///
/// Placeholders are `{map}`, `{score}` and `{player}`; the positional forms
/// `{0}`, `{1}` and `{2}` are accepted as well.
pub fn replay_file_name(format: &str, map_name: &str, time: Duration, player: &str) -> String {
    let format = if format.trim().is_empty() {
        DEFAULT_REPLAY_FILE_FORMAT
    } else {
        format
    };

    let map = SPECIAL_CHARS
        .replace_all(deformat(map_name).trim(), "_")
        .into_owned();
    let score = format_score(time);

    let name = format
        .replace("{map}", &map)
        .replace("{0}", &map)
        .replace("{score}", &score)
        .replace("{1}", &score)
        .replace("{player}", player)
        .replace("{2}", player);

    clear_file_name(&name)
}
