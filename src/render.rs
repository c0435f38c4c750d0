//! Plain-text views. Every function here is a pure function of state.

use crate::analysis::AnalysisResult;
use crate::app::{App, Tab};
use crate::audio::PlaybackStatus;
use crate::history::Session;
use crate::practice::ViewState;
use std::fmt::Write as _;

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        if score >= 80 {
            ScoreBand::Strong
        } else if score >= 60 {
            ScoreBand::Fair
        } else {
            ScoreBand::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Strong => "strong",
            ScoreBand::Fair => "fair",
            ScoreBand::Weak => "needs work",
        }
    }
}

/// `m:ss`
pub fn format_elapsed(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn score_bar(score: u8) -> String {
    let filled = (score.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

pub fn render(app: &App) -> String {
    let mut out = String::new();
    let (practice_mark, history_mark) = match app.tab() {
        Tab::Practice => ("*", " "),
        Tab::History => (" ", "*"),
    };
    let _ = writeln!(
        out,
        "[{}] Practice   [{}] History ({})",
        practice_mark,
        history_mark,
        app.history().len()
    );
    out.push_str(&"=".repeat(48));
    out.push('\n');

    match app.tab() {
        Tab::Practice => out.push_str(&render_practice(app.practice().state())),
        Tab::History => match app.selected_session() {
            Some(session) => out.push_str(&render_session(session)),
            None => out.push_str(&render_history(app.history().sessions())),
        },
    }
    if let Some(status) = app.playback_status() {
        out.push('\n');
        out.push_str(&render_playback(&status));
    }
    out
}

/// Player state, position and a progress bar.
pub fn render_playback(status: &PlaybackStatus) -> String {
    let icon = if status.finished {
        "■"
    } else if status.paused {
        "❚❚"
    } else {
        "▶"
    };
    let percent = if status.duration_secs > 0.0 {
        (status.position_secs / status.duration_secs * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        0
    };
    format!(
        "{} {}  {} / {} {}\n  pause | seek <secs> | stop-playback\n",
        icon,
        status.label,
        format_elapsed(status.position_secs as u32),
        format_elapsed(status.duration_secs.ceil() as u32),
        score_bar(percent)
    )
}

pub fn render_practice(state: &ViewState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Topic: {}", state.topic());
    out.push('\n');

    match state {
        ViewState::Idle { .. } => {
            out.push_str("Share your thoughts on the topic above.\n");
            out.push_str("  record | shuffle | today | topic <text>\n");
        }
        ViewState::Recording { elapsed, .. } => {
            let _ = writeln!(out, "● Listening... {}", format_elapsed(elapsed.seconds()));
            out.push_str("  stop\n");
        }
        ViewState::Analyzing { pending_audio, .. } => {
            let _ = writeln!(
                out,
                "Analyzing your fluency ({:.1}s of audio)...",
                pending_audio.duration_secs
            );
            out.push_str("  back (abandon)\n");
        }
        ViewState::Result { analysis, audio, .. } => {
            if let Some(audio) = audio {
                let _ = writeln!(out, "Recording: {:.1}s (play)", audio.duration_secs);
            }
            out.push_str(&render_analysis(analysis));
            out.push_str("\n  back\n");
        }
        ViewState::Error { error, .. } => {
            let _ = writeln!(out, "! {}", error);
            out.push_str("  back | record\n");
        }
    }
    out
}

pub fn render_analysis(result: &AnalysisResult) -> String {
    let mut out = String::new();
    for (label, score) in [("Fluency", result.fluency_score), ("Vocabulary", result.vocab_score)] {
        let _ = writeln!(
            out,
            "{:<11}{:>3} {} {}",
            label,
            score,
            score_bar(score),
            ScoreBand::of(score).label()
        );
    }

    let _ = writeln!(out, "\nTranscript:\n  \"{}\"", result.transcript);

    if result.grammar_errors.is_empty() {
        out.push_str("\nNo grammar corrections.\n");
    } else {
        let _ = writeln!(out, "\nCorrections ({}):", result.grammar_errors.len());
        for error in &result.grammar_errors {
            let _ = writeln!(out, "  - {}", error.original);
            let _ = writeln!(out, "    + {}", error.correction);
            let _ = writeln!(out, "      {}", error.explanation);
        }
    }

    let _ = writeln!(out, "\nSuggestions:\n  {}", result.general_suggestions);
    out
}

pub fn render_history(sessions: &[Session]) -> String {
    if sessions.is_empty() {
        return "No practice sessions yet. Record one from the Practice view.\n".to_string();
    }

    let mut out = String::new();
    for (index, session) in sessions.iter().enumerate() {
        let when = session
            .recorded_at()
            .map(|t| t.format("%Y-%m-%d • %H:%M").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        let scores = session
            .analysis
            .as_ref()
            .map(|a| format!("fluency {} · vocab {}", a.fluency_score, a.vocab_score))
            .unwrap_or_else(|| "no analysis".to_string());
        let _ = writeln!(out, "{:>3}. {}  {}", index + 1, when, session.topic);
        let _ = writeln!(out, "     {}", scores);
    }
    out.push_str("\n  open <n> | delete <n> | export <n> <file> | practice\n");
    out
}

pub fn render_session(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Topic: {}", session.topic);
    if let Some(when) = session.recorded_at() {
        let _ = writeln!(out, "Recorded: {}", when.format("%Y-%m-%d %H:%M"));
    }
    out.push('\n');
    match &session.analysis {
        Some(analysis) => out.push_str(&render_analysis(analysis)),
        None => out.push_str("No analysis stored for this session.\n"),
    }
    if session.audio_base64.is_some() {
        out.push_str("\n  play | close | delete | export <file>\n");
    } else {
        out.push_str("\n  close | delete\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GrammarError;

    fn sample() -> AnalysisResult {
        AnalysisResult {
            transcript: "he go to store".to_string(),
            fluency_score: 60,
            vocab_score: 55,
            grammar_errors: vec![GrammarError {
                original: "he go to store".to_string(),
                correction: "he goes to the store".to_string(),
                explanation: "subject-verb agreement".to_string(),
            }],
            general_suggestions: "practice verb conjugation".to_string(),
        }
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(65), "1:05");
        assert_eq!(format_elapsed(600), "10:00");
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(ScoreBand::of(100), ScoreBand::Strong);
        assert_eq!(ScoreBand::of(80), ScoreBand::Strong);
        assert_eq!(ScoreBand::of(79), ScoreBand::Fair);
        assert_eq!(ScoreBand::of(60), ScoreBand::Fair);
        assert_eq!(ScoreBand::of(59), ScoreBand::Weak);
    }

    #[test]
    fn test_score_bar_width() {
        assert_eq!(score_bar(0), format!("[{}]", "-".repeat(BAR_WIDTH)));
        assert_eq!(score_bar(100), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(score_bar(50).matches('#').count(), BAR_WIDTH / 2);
    }

    #[test]
    fn test_analysis_lists_corrections() {
        let text = render_analysis(&sample());
        assert!(text.contains("he goes to the store"));
        assert!(text.contains("subject-verb agreement"));
        assert!(text.contains("practice verb conjugation"));
        assert!(text.contains("needs work"));
    }

    #[test]
    fn test_empty_history_message() {
        assert!(render_history(&[]).starts_with("No practice sessions yet"));
    }

    #[test]
    fn test_history_is_numbered_newest_first() {
        let sessions = vec![
            Session::new("newest", None, Some(sample())),
            Session::new("oldest", None, None),
        ];
        let text = render_history(&sessions);
        let newest = text.find("newest").unwrap();
        let oldest = text.find("oldest").unwrap();
        assert!(newest < oldest);
        assert!(text.contains("  1. "));
        assert!(text.contains("fluency 60 · vocab 55"));
        assert!(text.contains("no analysis"));
    }

    #[test]
    fn test_playback_line() {
        let mut status = PlaybackStatus {
            label: "Weekends".to_string(),
            position_secs: 3.4,
            duration_secs: 10.0,
            paused: false,
            finished: false,
        };
        let line = render_playback(&status);
        assert!(line.starts_with("▶ Weekends  0:03 / 0:10"));

        status.paused = true;
        assert!(render_playback(&status).starts_with("❚❚"));
        status.finished = true;
        assert!(render_playback(&status).starts_with("■"));
    }

    #[test]
    fn test_idle_and_error_views() {
        let idle = render_practice(&ViewState::idle("Hobbies"));
        assert!(idle.contains("Topic: Hobbies"));
        assert!(idle.contains("record"));

        let error = render_practice(&ViewState::Error {
            topic: "Hobbies".to_string(),
            error: crate::practice::PracticeError::PermissionDenied {
                reason: "denied".to_string(),
            },
        });
        assert!(error.contains("! Microphone access denied."));
    }
}
