//! Diagnostic monitor commands of the Apollo2 driver.

use std::fmt::Write;

use crate::core::CoreInterface;

const HELP_TEXT: &str = "Supported commands:

    readuid - print the 8 byte unique device id
";

/// Handle one monitor command line, writing the reply to `out`.
///
/// `readuid` prints the unique device id as 16 hex digits, high word first.
/// A failing target read is reported in the reply; the command itself still
/// succeeds, like the other diagnostic commands of the surrounding tool.
/// Anything unrecognized prints the help text.
pub fn handle_monitor_command<C: CoreInterface>(
    core: &mut C,
    command: &str,
    out: &mut impl Write,
) -> std::fmt::Result {
    match command.trim() {
        "readuid" => match super::read_unique_id(core) {
            Ok(uid) => writeln!(out, "{uid:016x}"),
            Err(error) => writeln!(out, "Error while reading the unique id:\n\t{error}"),
        },
        _ => write!(out, "{HELP_TEXT}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::apollo2::rom;
    use crate::test::MockCore;

    #[test]
    fn readuid_prints_sixteen_hex_digits_high_word_first() {
        let mut core = MockCore::new();
        core.write_u32(rom::CHIPID0, 0x89ab_cdef);
        core.write_u32(rom::CHIPID1, 0x0123_4567);

        let mut out = String::new();
        handle_monitor_command(&mut core, "readuid", &mut out).unwrap();

        assert_eq!(out, "0123456789abcdef\n");
    }

    #[test]
    fn readuid_of_a_blank_target_is_zero_padded() {
        let mut core = MockCore::new();

        let mut out = String::new();
        handle_monitor_command(&mut core, "readuid", &mut out).unwrap();

        assert_eq!(out, "0000000000000000\n");
    }

    #[test]
    fn unknown_commands_print_the_help_text() {
        let mut core = MockCore::new();

        let mut out = String::new();
        handle_monitor_command(&mut core, "frobnicate", &mut out).unwrap();

        assert!(out.contains("readuid"));
    }
}
