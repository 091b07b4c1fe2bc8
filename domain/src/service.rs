use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    AlignedWord, Alignment, Diarization, DomainError, RawTurn, StageError, Transcript, Turn,
};

/// Distribute each segment's interval linearly over its whitespace
/// delimited words: word `i` of `k` covers
/// `[start + i * d / k, start + (i + 1) * d / k)` where `d = end - start`.
/// Segments with no words after trimming are skipped.
pub fn piecewise_linear(transcript: &Transcript) -> Alignment {
    let mut words = Vec::new();
    for segment in &transcript.segments {
        let tokens: Vec<&str> = segment.text.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let duration = segment.end - segment.start;
        let count = tokens.len() as f64;
        for (i, token) in tokens.iter().enumerate() {
            let start = segment.start + i as f64 * duration / count;
            let end = segment.start + (i as f64 + 1.0) * duration / count;
            words.push(AlignedWord {
                label: (*token).to_string(),
                start,
                end,
                score: 1.0,
            });
        }
    }
    Alignment { words }
}

static RAW_SPEAKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SPEAKER_(\d+)$").expect("static speaker pattern"));

const ORDINAL_WORDS: [&str; 9] = [
    "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];

/// Rename raw diarizer labels by population: a lone speaker becomes
/// "Speaker", up to three become ordinal words ("Speaker One"), larger
/// populations become numeric ("Speaker 4"). A label outside the
/// `SPEAKER_<n>` enumeration is an annotation failure.
pub fn name_speakers(turns: Vec<RawTurn>) -> Result<Diarization, DomainError> {
    let mut indices = Vec::with_capacity(turns.len());
    for turn in &turns {
        let captures = RAW_SPEAKER.captures(&turn.label).ok_or_else(|| {
            StageError::Annotation(format!("unexpected speaker format: {}", turn.label))
        })?;
        let index: usize = captures[1].parse().map_err(|_| {
            StageError::Annotation(format!("unexpected speaker format: {}", turn.label))
        })?;
        indices.push(index);
    }

    let population = indices.iter().copied().collect::<HashSet<_>>().len();
    let turns = turns
        .into_iter()
        .zip(indices)
        .map(|(turn, index)| Turn {
            speaker: speaker_name(index, population),
            start: turn.start,
            end: turn.end,
        })
        .collect();
    Ok(Diarization { turns })
}

fn speaker_name(index: usize, population: usize) -> String {
    if population == 1 {
        return "Speaker".to_string();
    }
    let number = index + 1;
    if population <= 3 {
        if let Some(word) = ORDINAL_WORDS.get(number - 1) {
            return format!("Speaker {word}");
        }
    }
    format!("Speaker {number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranscriptSegment;

    fn transcript(segments: Vec<TranscriptSegment>) -> Transcript {
        Transcript {
            language: Some("en".to_string()),
            text: segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            segments,
        }
    }

    fn segment(text: &str, start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn alignment_distributes_words_linearly() {
        let words_23 = vec!["w"; 23].join(" ");
        let words_21 = vec!["w"; 21].join(" ");
        let alignment = piecewise_linear(&transcript(vec![
            segment(&words_23, 0.0, 10.0),
            segment(&words_21, 10.88, 17.08),
        ]));

        assert_eq!(alignment.words.len(), 44);
        assert_eq!(alignment.words[0].start, 0.0);
        assert_eq!(alignment.words[1].start, 1.0 * 10.0 / 23.0);
        assert_eq!(alignment.words[23].start, 10.88);
        assert_eq!(
            alignment.words[24].start,
            10.88 + 1.0 * (17.08 - 10.88) / 21.0
        );
        assert!(alignment.words.iter().all(|w| w.score == 1.0));
    }

    #[test]
    fn alignment_word_intervals_cover_the_segment() {
        let alignment = piecewise_linear(&transcript(vec![segment("a b", 2.0, 4.0)]));
        assert_eq!(alignment.words[0].start, 2.0);
        assert_eq!(alignment.words[0].end, 3.0);
        assert_eq!(alignment.words[1].start, 3.0);
        assert_eq!(alignment.words[1].end, 4.0);
    }

    #[test]
    fn alignment_skips_empty_segments() {
        let alignment = piecewise_linear(&transcript(vec![
            segment("   ", 0.0, 1.0),
            segment("word", 1.0, 2.0),
        ]));
        assert_eq!(alignment.words.len(), 1);
        assert_eq!(alignment.words[0].label, "word");
    }

    #[test]
    fn one_speaker_gets_the_generic_label() {
        let diarization = name_speakers(vec![
            RawTurn::new("SPEAKER_00", 0.0, 1.0),
            RawTurn::new("SPEAKER_00", 1.5, 2.0),
        ])
        .expect("labels are well formed");

        assert!(diarization.turns.iter().all(|t| t.speaker == "Speaker"));
    }

    #[test]
    fn small_populations_get_ordinal_words() {
        let diarization = name_speakers(vec![
            RawTurn::new("SPEAKER_00", 0.0, 1.0),
            RawTurn::new("SPEAKER_01", 1.0, 2.0),
            RawTurn::new("SPEAKER_00", 2.0, 3.0),
        ])
        .expect("labels are well formed");

        assert_eq!(diarization.turns[0].speaker, "Speaker One");
        assert_eq!(diarization.turns[1].speaker, "Speaker Two");
        assert_eq!(diarization.turns[2].speaker, "Speaker One");
    }

    #[test]
    fn large_populations_get_numeric_labels() {
        let turns = (0..5)
            .map(|i| RawTurn::new(format!("SPEAKER_{i:02}"), i as f64, i as f64 + 1.0))
            .collect();
        let diarization = name_speakers(turns).expect("labels are well formed");

        let labels: Vec<_> = diarization.turns.iter().map(|t| t.speaker.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Speaker 1", "Speaker 2", "Speaker 3", "Speaker 4", "Speaker 5"]
        );
    }

    #[test]
    fn unexpected_label_shape_is_an_annotation_error() {
        let result = name_speakers(vec![RawTurn::new("narrator", 0.0, 1.0)]);
        assert!(matches!(
            result,
            Err(DomainError::Stage(StageError::Annotation(_)))
        ));
    }
}
