// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON export of the wall graph.
//!
//! [`GraphDocument`] is the persisted shape:
//! `{"nodes": [...], "edges": [...], "furnitures": []}`. The
//! [`GraphWriter`] keeps the latest published document and writes it from a
//! background thread at a fixed wall-clock interval, so a long simulation
//! can be watched while it runs.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::{Edge, FloorGraph, Node};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Always empty; kept for readers that expect the key
    pub furnitures: Vec<serde_json::Value>,
}

impl GraphDocument {
    /// Copies the graph, scaling planar lengths by `meter_per_pixel` when given.
    pub fn from_graph(graph: &FloorGraph, meter_per_pixel: Option<f64>) -> Self {
        let scale = meter_per_pixel.unwrap_or(1.0);
        let nodes = graph
            .nodes
            .iter()
            .map(|n| Node {
                id: n.id,
                x: n.x * scale,
                y: n.y * scale,
            })
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|e| {
                let mut edge = e.clone();
                for opening in &mut edge.openings {
                    opening.center_x *= scale;
                    opening.width *= scale;
                }
                edge
            })
            .collect();

        Self {
            nodes,
            edges,
            furnitures: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Writes `doc` next to `path` and renames it into place.
pub fn write_json(path: &Path, doc: &GraphDocument) -> Result<()> {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, doc.to_json()?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Background writer for the latest published document.
pub struct GraphWriter {
    path: PathBuf,
    tx: Option<mpsc::Sender<GraphDocument>>,
    handle: Option<JoinHandle<Result<usize>>>,
}

impl GraphWriter {
    /// Starts the writer thread; it flushes at most once per `interval`.
    pub fn spawn(path: impl Into<PathBuf>, interval: Duration) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel::<GraphDocument>();
        let target = path.clone();
        let handle = thread::spawn(move || run_writer(&target, &rx, interval));

        Self {
            path,
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the pending document. Returns `false` if the writer is gone.
    pub fn publish(&self, doc: GraphDocument) -> bool {
        match &self.tx {
            Some(tx) => tx.send(doc).is_ok(),
            None => false,
        }
    }

    /// Writes whatever is still pending and stops the thread.
    /// Returns the number of files written.
    pub fn finish(mut self) -> Result<usize> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<usize> {
        // closing the channel is the stop signal
        self.tx = None;
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Io(std::io::Error::other("graph writer panicked")))?,
            None => Ok(0),
        }
    }
}

impl Drop for GraphWriter {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(path = %self.path.display(), error = %e, "final graph write failed");
        }
    }
}

fn run_writer(path: &Path, rx: &mpsc::Receiver<GraphDocument>, interval: Duration) -> Result<usize> {
    let mut latest: Option<GraphDocument> = None;
    let mut writes = 0;
    let mut last_flush = Instant::now();

    loop {
        let timeout = interval.saturating_sub(last_flush.elapsed());
        match rx.recv_timeout(timeout) {
            Ok(doc) => latest = Some(doc),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(doc) = latest.take() {
                    write_json(path, &doc)?;
                    writes += 1;
                }
                debug!(path = %path.display(), writes, "graph writer stopped");
                return Ok(writes);
            }
        }

        if last_flush.elapsed() >= interval {
            if let Some(doc) = latest.take() {
                match write_json(path, &doc) {
                    Ok(()) => writes += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "graph write failed"),
                }
            }
            last_flush = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeOpening;
    use crate::types::{OpeningType, WallType};
    use approx::assert_relative_eq;

    fn sample_graph() -> FloorGraph {
        FloorGraph {
            nodes: vec![
                Node { id: 0, x: 10.0, y: 20.0 },
                Node { id: 1, x: 110.0, y: 20.0 },
            ],
            edges: vec![Edge {
                id: 0,
                start_node: 0,
                end_node: 1,
                wall_type: WallType::Exterior,
                stud_type: "2x6".into(),
                height: 2.7,
                openings: vec![EdgeOpening {
                    opening_type: OpeningType::Door,
                    center_x: 40.0,
                    bottom_z: 0.0,
                    width: 30.0,
                    height: 2.1,
                }],
            }],
        }
    }

    #[test]
    fn test_json_shape() {
        let doc = GraphDocument::from_graph(&sample_graph(), None);
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(value["nodes"][1]["x"], 110.0);
        assert_eq!(value["edges"][0]["wall_type"], "exterior");
        assert_eq!(value["edges"][0]["openings"][0]["type"], "door");
        assert_eq!(value["furnitures"], serde_json::json!([]));
    }

    #[test]
    fn test_meter_per_pixel_scales_planar_lengths() {
        let doc = GraphDocument::from_graph(&sample_graph(), Some(0.05));
        assert_relative_eq!(doc.nodes[1].x, 5.5);
        assert_relative_eq!(doc.nodes[1].y, 1.0);
        let opening = &doc.edges[0].openings[0];
        assert_relative_eq!(opening.center_x, 2.0);
        assert_relative_eq!(opening.width, 1.5);
        // heights are already metric
        assert_relative_eq!(opening.height, 2.1);
    }

    #[test]
    fn test_writer_flushes_latest_on_finish() {
        let path = std::env::temp_dir().join(format!("wall-agents-{}-writer.json", std::process::id()));
        let writer = GraphWriter::spawn(&path, Duration::from_secs(60));
        assert!(writer.publish(GraphDocument::default()));
        assert!(writer.publish(GraphDocument::from_graph(&sample_graph(), None)));
        let writes = writer.finish().unwrap();
        assert_eq!(writes, 1);

        let read: GraphDocument = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read.nodes.len(), 2);
        fs::remove_file(&path).unwrap();
    }
}
