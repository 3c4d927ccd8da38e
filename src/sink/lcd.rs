use std::io::Write;
use std::time::Duration;
use tokio::runtime::RuntimeFlavor;

use super::{DisplaySink, RenderPolicy};
use crate::error::TransportError;
use crate::types::PlaybackState;

/// Characters per LCD row.
pub const FIELD_WIDTH: usize = 16;
pub const NOTHING_PLAYING: &str = "Nothing playing";

const SEPARATOR: char = '|';

/// Writes `"<track>|<artist>\n"` lines to a character LCD controller.
///
/// Generic over the transport so tests can capture bytes in a `Vec<u8>`.
pub struct SerialLcdSink<W: Write + Send> {
    port: W,
}

impl SerialLcdSink<Box<dyn serialport::SerialPort>> {
    /// Open `path` at `baud` and wait `settle` for the board to reset.
    pub async fn open(path: &str, baud: u32, settle: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|source| TransportError::Open {
                port: path.to_string(),
                source,
            })?;

        log::info!("Opened serial port {} at {} baud", path, baud);

        // Opening the port resets most Arduino boards
        tokio::time::sleep(settle).await;

        Ok(Self::new(port))
    }
}

impl<W: Write + Send> SerialLcdSink<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.port
    }
}

impl<W: Write + Send> DisplaySink for SerialLcdSink<W> {
    fn name(&self) -> &'static str {
        "lcd"
    }

    fn policy(&self) -> RenderPolicy {
        RenderPolicy::OnChange
    }

    fn render(&mut self, state: Option<&PlaybackState>) -> Result<(), TransportError> {
        let line = format_line(state);
        let port = &mut self.port;
        blocking(|| {
            port.write_all(line.as_bytes())?;
            port.flush()
        })?;

        log::info!("Sent: {}", line.trim_end());
        Ok(())
    }
}

/// Serial writes block for up to the port timeout. On a multi-threaded
/// runtime, tell the scheduler so other tasks move off this worker.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// The exact line sent to the display for `state`.
///
/// Paused playback counts as nothing playing.
pub fn format_line(state: Option<&PlaybackState>) -> String {
    match state {
        Some(state) if state.is_playing => format!(
            "{}{}{}\n",
            fit_field(&state.track_name),
            SEPARATOR,
            fit_field(state.primary_artist())
        ),
        _ => format!("{}{}\n", NOTHING_PLAYING, SEPARATOR),
    }
}

/// Clip to [`FIELD_WIDTH`] characters; separator and control characters
/// would break the line framing on the board side.
fn fit_field(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            SEPARATOR => '/',
            c if c.is_control() => ' ',
            c => c,
        })
        .take(FIELD_WIDTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sample_state;

    #[test]
    fn formats_track_and_primary_artist() {
        let mut state = sample_state("Song", "Artist");
        state.artist_names.push("Featured".to_string());
        assert_eq!(format_line(Some(&state)), "Song|Artist\n");
    }

    #[test]
    fn truncates_each_field_to_sixteen_characters() {
        let state = sample_state(
            "A Very Long Track Name That Overflows",
            "An Artist With A Long Name",
        );
        assert_eq!(
            format_line(Some(&state)),
            "A Very Long Trac|An Artist With A\n"
        );
    }

    #[test]
    fn exactly_sixteen_characters_is_untouched() {
        let track = "Sixteen chars!!!";
        assert_eq!(track.chars().count(), FIELD_WIDTH);

        let line = format_line(Some(&sample_state(track, "Band")));
        assert_eq!(line, "Sixteen chars!!!|Band\n");
        assert_eq!(line.len(), FIELD_WIDTH + 1 + "Band".len() + 1);
        assert!(!line.contains("..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let line = format_line(Some(&sample_state("ÄÖÜäöüßÄÖÜäöüßÄÖÜ", "Björk")));
        assert_eq!(line, "ÄÖÜäöüßÄÖÜäöüßÄÖ|Björk\n");
    }

    #[test]
    fn nothing_playing_for_absent_or_paused_state() {
        assert_eq!(format_line(None), "Nothing playing|\n");

        let mut paused = sample_state("Song", "Artist");
        paused.is_playing = false;
        assert_eq!(format_line(Some(&paused)), "Nothing playing|\n");
    }

    #[test]
    fn separator_and_newlines_inside_names_are_neutralised() {
        let line = format_line(Some(&sample_state("AC|DC\nLive", "X")));
        assert_eq!(line, "AC/DC Live|X\n");
    }

    #[test]
    fn render_writes_bytes_to_transport() {
        let mut sink = SerialLcdSink::new(Vec::new());
        sink.render(Some(&sample_state("Song", "Artist"))).unwrap();
        sink.render(None).unwrap();
        assert_eq!(sink.into_inner(), b"Song|Artist\nNothing playing|\n");
    }

    struct BrokenPort;

    impl Write for BrokenPort {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn render_inside_multi_thread_runtime() {
        let mut sink = SerialLcdSink::new(Vec::new());
        sink.render(Some(&sample_state("Song", "Artist"))).unwrap();
        assert_eq!(sink.into_inner(), b"Song|Artist\n");
    }

    #[tokio::test]
    async fn render_inside_current_thread_runtime() {
        let mut sink = SerialLcdSink::new(Vec::new());
        sink.render(None).unwrap();
        assert_eq!(sink.into_inner(), b"Nothing playing|\n");
    }

    #[test]
    fn write_failure_surfaces_as_transport_error() {
        let mut sink = SerialLcdSink::new(BrokenPort);
        let err = sink.render(None).unwrap_err();
        assert!(matches!(err, TransportError::Write(_)));
    }
}
