use pretty_assertions::assert_eq;

use framesearch::{FrameRef, KeyMatch, Locator, LocatorConfig, Playback, TextResource};

fn fixture(name: &str) -> TextResource {
    TextResource::parse(&format!(
        "{}/tests/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    ))
    .expect("fixture path")
}

fn locator(key_match: KeyMatch) -> Locator {
    Locator::new(
        LocatorConfig {
            ocr_index: fixture("frame_url_ocr.txt"),
            legacy_index: fixture("frame_url.txt"),
            key_match,
            embed_base: "https://www.youtube.com/embed/".to_string(),
        },
        reqwest::Client::new(),
    )
}

async fn resolve(locator: &Locator, key: &str, image_id: u64) -> Option<Playback> {
    let frame = FrameRef::parse(key, image_id).expect("frame key");
    locator.resolve(&frame).await.expect("resolve")
}

#[tokio::test(flavor = "current_thread")]
async fn ocr_frames_use_the_ocr_index() {
    let locator = locator(KeyMatch::Prefix);

    let playback = resolve(&locator, "V004_125", 0).await.expect("V004");
    assert_eq!(
        playback,
        Playback {
            video_id: "abc123".to_string(),
            fps: 30.0,
            start_seconds: 5,
            embed_url: "https://www.youtube.com/embed/abc123?start=5&autoplay=1".to_string(),
        }
    );

    let short_link = resolve(&locator, "V005_0", 0).await.expect("V005");
    assert_eq!(short_link.video_id, "def456");
    assert_eq!(short_link.fps, 25.0);
    assert_eq!(short_link.start_seconds, 1);

    assert!(resolve(&locator, "V009_10", 0).await.is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn prefix_and_exact_matching_differ() {
    let prefix = locator(KeyMatch::Prefix);
    let exact = locator(KeyMatch::Exact);

    let playback = resolve(&prefix, "V006_50", 0).await.expect("prefix hit");
    assert_eq!(playback.video_id, "ghi789");
    assert_eq!(playback.start_seconds, 1);
    assert!(resolve(&exact, "V006_50", 0).await.is_none());

    // Fallback frames look up "L13", which prefixes the first legacy line.
    let fallback = resolve(&prefix, "thumbnail", 7).await.expect("fallback");
    assert_eq!(fallback.video_id, "leg001");
    let fallback = resolve(&exact, "thumbnail", 7).await.expect("fallback");
    assert_eq!(fallback.video_id, "tour013");
    assert_eq!(fallback.start_seconds, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn legacy_keys_use_the_legacy_index() {
    let locator = locator(KeyMatch::Prefix);

    let path = resolve(&locator, "L13/L13_V002/100", 0).await.expect("path key");
    assert_eq!(path.video_id, "leg002");
    assert_eq!(path.fps, 25.0);
    assert_eq!(path.start_seconds, 5);

    let legacy = resolve(&locator, "L13_V001_40", 0).await.expect("legacy key");
    assert_eq!(legacy.video_id, "leg001");
    assert_eq!(legacy.start_seconds, 2);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_index_is_an_error_until_fixed() {
    let locator = Locator::new(
        LocatorConfig {
            ocr_index: TextResource::parse("tests/fixtures/absent.txt").expect("path"),
            legacy_index: fixture("frame_url.txt"),
            key_match: KeyMatch::Prefix,
            embed_base: framesearch::locator::DEFAULT_EMBED_BASE.to_string(),
        },
        reqwest::Client::new(),
    );
    let ocr = FrameRef::parse("V004_1", 0).expect("key");
    assert!(locator.resolve(&ocr).await.is_err());

    let legacy = FrameRef::parse("L13_V001_0", 0).expect("key");
    let playback = locator.resolve(&legacy).await.expect("legacy index");
    assert_eq!(
        playback.map(|p| p.embed_url),
        Some("https://www.youtube.com/embed/leg001?start=1&autoplay=1".to_string())
    );
}
