mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use murmur_application::{
    PipelineEvent, PipelineProgress, PipelineSettings, PipelineState, PipelineUseCase,
};
use murmur_domain::{
    RawTurn, StageError, StageUpdate, Track, TranscodeOutput, Transcript, Transcription,
};

use support::{
    sample_transcript, upload_info, MemoryMediaStore, MemoryMetadataStore, ScriptedStage,
    StalledStage,
};

fn track() -> Track {
    Track {
        title: Some("One".to_string()),
        duration: Some(1.46),
        path: Some("/media/abc.wav".to_string()),
        ..Track::default()
    }
}

fn two_speaker_turns() -> Vec<RawTurn> {
    vec![
        RawTurn::new("SPEAKER_00", 0.0, 0.7),
        RawTurn::new("SPEAKER_01", 0.7, 1.4),
    ]
}

struct Harness {
    metadata: Arc<MemoryMetadataStore>,
    transcoder: Arc<ScriptedStage<TranscodeOutput>>,
    transcriber: Arc<ScriptedStage<Transcript>>,
    annotator: Arc<ScriptedStage<Vec<RawTurn>>>,
    pipeline: Arc<PipelineUseCase>,
}

fn harness(settings: PipelineSettings) -> Harness {
    let metadata = Arc::new(MemoryMetadataStore::default());
    let media = Arc::new(MemoryMediaStore::default());
    let transcoder = Arc::new(ScriptedStage::default());
    let transcriber = Arc::new(ScriptedStage::default());
    let annotator = Arc::new(ScriptedStage::default());
    let pipeline = Arc::new(PipelineUseCase::new(
        metadata.clone(),
        media,
        transcoder.clone(),
        transcriber.clone(),
        annotator.clone(),
        settings,
    ));
    Harness {
        metadata,
        transcoder,
        transcriber,
        annotator,
        pipeline,
    }
}

fn seed(harness: &Harness) -> String {
    let record = Transcription::new("abc", upload_info(), "/media/abc");
    harness.metadata.seed(record);
    "abc".to_string()
}

fn script_happy_path(harness: &Harness) {
    harness.transcoder.push_script(vec![
        StageUpdate::Percent(48),
        StageUpdate::Percent(96),
        StageUpdate::Output(TranscodeOutput { track: track() }),
    ]);
    harness.transcriber.push_script(vec![
        StageUpdate::Percent(50),
        StageUpdate::Output(sample_transcript()),
    ]);
    harness.annotator.push_script(vec![
        StageUpdate::Percent(100),
        StageUpdate::Output(two_speaker_turns()),
    ]);
}

async fn collect(harness: &Harness, id: &str, language: Option<&str>) -> Vec<PipelineEvent> {
    harness
        .pipeline
        .clone()
        .run(id.to_string(), language.map(str::to_string))
        .collect()
        .await
}

fn names(events: &[PipelineEvent]) -> Vec<&'static str> {
    events.iter().map(PipelineEvent::name).collect()
}

fn state_of(event: &PipelineEvent) -> Option<PipelineState> {
    match event {
        PipelineEvent::Pipeline(PipelineProgress { state, .. }) => Some(*state),
        _ => None,
    }
}

#[tokio::test]
async fn full_run_orders_stage_events_and_persists_each_stage() {
    let harness = harness(PipelineSettings::default());
    let id = seed(&harness);
    script_happy_path(&harness);

    let events = collect(&harness, &id, Some("en")).await;

    assert_eq!(
        names(&events),
        vec![
            "PipelineProgress",
            "TranscodingProgress",
            "TranscodingProgress",
            "TranscodingProgress",
            "PipelineProgress",
            "TranscriptionProgress",
            "TranscriptionProgress",
            "PipelineProgress",
            "AnnotationProgress",
            "AnnotationProgress",
            "PipelineProgress",
        ]
    );
    assert_eq!(state_of(&events[0]), Some(PipelineState::Transcoding));
    assert_eq!(state_of(&events[4]), Some(PipelineState::Transcribing));
    assert_eq!(state_of(&events[7]), Some(PipelineState::Annotating));
    assert_eq!(state_of(&events[10]), Some(PipelineState::Completed));

    let record = harness.metadata.get(&id).expect("record persisted");
    assert!(record.is_transcoded());
    assert_eq!(record.transcript, Some(sample_transcript()));
    assert_eq!(record.language, Some("en".to_string()));
    assert_eq!(
        record.alignment.as_ref().map(|a| a.words.len()),
        Some(1),
        "alignment derived from the transcript"
    );
    let diarization = record.diarization.expect("diarization persisted");
    assert_eq!(diarization.turns[0].speaker, "Speaker One");
    assert_eq!(diarization.turns[1].speaker, "Speaker Two");

    // the completed event carries the persisted snapshot
    match events.last().expect("terminal event") {
        PipelineEvent::Pipeline(PipelineProgress {
            transcription: Some(snapshot),
            ..
        }) => {
            assert_eq!(snapshot, &harness.metadata.get(&id).expect("record"));
        }
        other => panic!("unexpected terminal event: {other:?}"),
    }
}

#[tokio::test]
async fn transcoded_record_skips_straight_to_transcribing() {
    let harness = harness(PipelineSettings::default());
    let id = seed(&harness);
    let mut record = harness.metadata.get(&id).expect("seeded");
    record.track = Some(track());
    record.transcoded = true;
    harness.metadata.seed(record);

    harness.transcriber.push_script(vec![StageUpdate::Output(sample_transcript())]);
    harness
        .annotator
        .push_script(vec![StageUpdate::Output(two_speaker_turns())]);

    let events = collect(&harness, &id, None).await;

    assert_eq!(harness.transcoder.run_count(), 0, "no re-encoding happened");
    assert_eq!(state_of(&events[0]), Some(PipelineState::Transcribing));
    assert_eq!(
        state_of(events.last().expect("terminal event")),
        Some(PipelineState::Completed)
    );
}

#[tokio::test]
async fn unchanged_language_reuses_the_transcript() {
    let harness = harness(PipelineSettings::default());
    let id = seed(&harness);
    let mut record = harness.metadata.get(&id).expect("seeded");
    record.track = Some(track());
    record.transcoded = true;
    record.transcript = Some(sample_transcript());
    record.language = Some("en".to_string());
    harness.metadata.seed(record);

    harness
        .annotator
        .push_script(vec![StageUpdate::Output(two_speaker_turns())]);

    let events = collect(&harness, &id, Some("en")).await;

    assert_eq!(harness.transcriber.run_count(), 0);
    assert_eq!(state_of(&events[0]), Some(PipelineState::Annotating));
}

#[tokio::test]
async fn language_change_forces_retranscription() {
    let harness = harness(PipelineSettings::default());
    let id = seed(&harness);
    let mut record = harness.metadata.get(&id).expect("seeded");
    record.track = Some(track());
    record.transcoded = true;
    record.transcript = Some(sample_transcript());
    record.language = Some("en".to_string());
    harness.metadata.seed(record);

    harness.transcriber.push_script(vec![StageUpdate::Output(Transcript {
        language: Some("fr".to_string()),
        ..sample_transcript()
    })]);
    harness
        .annotator
        .push_script(vec![StageUpdate::Output(two_speaker_turns())]);

    collect(&harness, &id, Some("fr")).await;

    assert_eq!(harness.transcriber.run_count(), 1);
    let record = harness.metadata.get(&id).expect("record persisted");
    assert_eq!(record.language, Some("fr".to_string()));
}

#[tokio::test]
async fn diarization_reruns_by_default_and_can_be_pinned() {
    let previous = murmur_domain::Diarization {
        turns: vec![murmur_domain::Turn {
            speaker: "Speaker".to_string(),
            start: 0.0,
            end: 1.0,
        }],
    };

    for (rerun, expected_runs) in [(true, 1), (false, 0)] {
        let harness = harness(PipelineSettings {
            rerun_diarization: rerun,
            ..PipelineSettings::default()
        });
        let id = seed(&harness);
        let mut record = harness.metadata.get(&id).expect("seeded");
        record.track = Some(track());
        record.transcoded = true;
        record.transcript = Some(sample_transcript());
        record.diarization = Some(previous.clone());
        harness.metadata.seed(record);

        harness
            .annotator
            .push_script(vec![StageUpdate::Output(two_speaker_turns())]);

        let events = collect(&harness, &id, None).await;

        assert_eq!(harness.annotator.run_count(), expected_runs);
        assert_eq!(
            state_of(events.last().expect("terminal event")),
            Some(PipelineState::Completed)
        );
    }
}

#[tokio::test]
async fn stage_failure_ends_the_stream_with_an_error_state() {
    let harness = harness(PipelineSettings::default());
    let id = seed(&harness);
    harness.transcoder.push_script(vec![
        StageUpdate::Percent(10),
        StageUpdate::Failure(StageError::Transcode("ffmpeg failed : 1".to_string())),
    ]);

    let events = collect(&harness, &id, None).await;

    assert_eq!(
        names(&events),
        vec!["PipelineProgress", "TranscodingProgress", "PipelineProgress"]
    );
    assert_eq!(
        state_of(events.last().expect("terminal event")),
        Some(PipelineState::Error)
    );
    assert_eq!(harness.transcriber.run_count(), 0, "later stages never ran");

    let record = harness.metadata.get(&id).expect("record");
    assert!(!record.transcoded, "failed stage persisted nothing");
}

#[tokio::test]
async fn stage_stream_ending_without_a_result_is_fatal() {
    let harness = harness(PipelineSettings::default());
    let id = seed(&harness);
    harness.transcoder.push_script(vec![StageUpdate::Percent(10)]);

    let events = collect(&harness, &id, None).await;

    assert_eq!(
        state_of(events.last().expect("terminal event")),
        Some(PipelineState::Error)
    );
}

#[tokio::test]
async fn unknown_id_yields_a_single_error_event() {
    let harness = harness(PipelineSettings::default());
    let events = collect(&harness, "missing", None).await;

    assert_eq!(names(&events), vec!["PipelineProgress"]);
    assert_eq!(state_of(&events[0]), Some(PipelineState::Error));
}

#[tokio::test]
async fn stalled_stage_times_out() {
    let metadata = Arc::new(MemoryMetadataStore::default());
    let media = Arc::new(MemoryMediaStore::default());
    let pipeline = Arc::new(PipelineUseCase::new(
        metadata.clone(),
        media,
        Arc::new(StalledStage),
        Arc::new(ScriptedStage::<Transcript>::default()),
        Arc::new(ScriptedStage::<Vec<RawTurn>>::default()),
        PipelineSettings {
            stage_timeout: Duration::from_millis(20),
            ..PipelineSettings::default()
        },
    ));
    metadata.seed(Transcription::new("abc", upload_info(), "/media/abc"));

    let events: Vec<_> = pipeline.run("abc".to_string(), None).collect().await;

    assert_eq!(
        state_of(events.last().expect("terminal event")),
        Some(PipelineState::Error)
    );
}
