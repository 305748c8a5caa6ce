//! A small synthetic video: objects moving right at one pixel per frame.

use std::path::Path;

use pathq_models::{Detection, FrameDetections, Rect, Track};
use pathq_worker::WorkerConfig;
use tempfile::TempDir;

pub const FRAMES: u64 = 120;

/// Catalogue with two queries over one custom point-set predicate: `lane`
/// and `night`, which watches a different source.
const CATALOG: &str = r#"{
    "predicates": [
        {"name": "lane", "kind": "point_set",
         "regions": [{"rect": {"left": -50, "top": -10, "right": 1000, "bottom": 150}}]}
    ],
    "queries": {
        "lane": {
            "detections": "detections.json",
            "validation": {"start": 0, "end": 60},
            "ground_truth": "truth.json",
            "execution": {"start": 0, "end": 120},
            "model": {"name": "recorded", "filter_grid": [0.0, 0.25, 0.5, 0.75]}
        },
        "night": {
            "predicate": "lane",
            "detections": "night/detections.json",
            "validation": {"start": 0, "end": 60},
            "ground_truth": "night/truth.json",
            "execution": {"start": 0, "end": 120},
            "model": {"name": "recorded", "filter_grid": [0.0, 0.25, 0.5, 0.75]}
        }
    }
}"#;

pub fn object(id: u64, y: f64, score: f64) -> Track {
    Track::new(
        id,
        (0..FRAMES)
            .map(|f| {
                let x = f as f64;
                Detection::new(f, Rect::new(x, y, x + 20.0, y + 20.0), score)
            })
            .collect(),
    )
    .unwrap()
}

/// Two objects inside the lane and one below it.
pub fn real_objects() -> Vec<Track> {
    vec![object(0, 0.0, 0.8), object(1, 100.0, 0.8), object(2, 300.0, 0.8)]
}

/// The `night` source: a single object inside the lane.
pub fn night_objects() -> Vec<Track> {
    vec![object(0, 50.0, 0.8)]
}

pub struct Workspace {
    pub dir: TempDir,
    pub config: WorkerConfig,
}

impl Workspace {
    /// Write the catalogue, ground truth and recorded detections.
    ///
    /// `extra` objects are seen by the model but are not in the ground truth.
    pub fn new(extra: Vec<Track>) -> Self {
        let dir = TempDir::new().unwrap();
        let truth = real_objects();
        let seen: Vec<Track> = truth.iter().cloned().chain(extra).collect();

        write_json(&dir.path().join("truth.json"), &truth);
        write_json(&dir.path().join("detections.json"), &render(&seen));
        std::fs::create_dir_all(dir.path().join("night")).unwrap();
        write_json(&dir.path().join("night/truth.json"), &night_objects());
        write_json(&dir.path().join("night/detections.json"), &render(&night_objects()));
        std::fs::write(dir.path().join("catalog.json"), CATALOG).unwrap();

        let config = WorkerConfig {
            log_dir: dir.path().join("logs"),
            catalog_path: dir.path().join("catalog.json"),
            ..WorkerConfig::default()
        };
        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn render(tracks: &[Track]) -> Vec<FrameDetections> {
    (0..FRAMES)
        .map(|f| {
            let detections = tracks
                .iter()
                .filter_map(|t| t.at_frame(f))
                .map(|d| Detection::new(f, d.bounds, d.score))
                .collect();
            FrameDetections::new(f, detections)
        })
        .collect()
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}
