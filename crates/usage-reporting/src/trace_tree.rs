use std::{
    collections::HashMap,
    time::{Instant, SystemTime},
};

use engine::{FieldInfo, PathSegment, ResponsePath};

use crate::proto::{
    trace::{self, node},
    Trace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TraceTreeError {
    #[error("start_timing called twice")]
    AlreadyStarted,
    #[error("start_timing called after stop_timing")]
    StartedAfterStop,
    #[error("stop_timing called before start_timing")]
    NotStarted,
    #[error("stop_timing called twice")]
    AlreadyStopped,
}

#[derive(Debug, Clone, Copy)]
enum Timing {
    Unstarted,
    Started {
        clock: Instant,
        start_time: SystemTime,
    },
    Stopped {
        start_time: SystemTime,
        end_time: SystemTime,
        duration_ns: u64,
    },
}

/// Index of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct NodeData {
    id: Option<node::Id>,
    return_type: String,
    parent_type: String,
    original_field_name: String,
    start_time: u64,
    end_time: u64,
    errors: Vec<trace::Error>,
    children: Vec<usize>,
}

/// Timing tree of a single request. Nodes live in an arena and are found by the dot-joined
/// response path, the root node has the empty key.
#[derive(Debug)]
pub struct TraceTreeBuilder {
    timing: Timing,
    nodes: Vec<NodeData>,
    by_path: HashMap<String, usize>,
}

impl Default for TraceTreeBuilder {
    fn default() -> Self {
        TraceTreeBuilder {
            timing: Timing::Unstarted,
            nodes: vec![NodeData::default()],
            by_path: HashMap::from([(String::new(), 0)]),
        }
    }
}

impl TraceTreeBuilder {
    pub fn start_timing(&mut self) -> Result<(), TraceTreeError> {
        match self.timing {
            Timing::Unstarted => {
                self.timing = Timing::Started {
                    clock: Instant::now(),
                    start_time: SystemTime::now(),
                };
                Ok(())
            }
            Timing::Started { .. } => Err(TraceTreeError::AlreadyStarted),
            Timing::Stopped { .. } => Err(TraceTreeError::StartedAfterStop),
        }
    }

    pub fn stop_timing(&mut self) -> Result<(), TraceTreeError> {
        match self.timing {
            Timing::Started { clock, start_time } => {
                let duration_ns = nanos_since(clock);
                self.timing = Timing::Stopped {
                    start_time,
                    end_time: SystemTime::now(),
                    duration_ns,
                };

                // A field still resolving when the request ends finishes with the request.
                for node in self.nodes.iter_mut().skip(1) {
                    node.end_time = node.end_time.min(duration_ns);
                }

                Ok(())
            }
            Timing::Unstarted => Err(TraceTreeError::NotStarted),
            Timing::Stopped { .. } => Err(TraceTreeError::AlreadyStopped),
        }
    }

    /// Records the start of a field. Returns `None` outside of the timing window, fields are
    /// then not part of the trace.
    pub fn will_resolve_field(&mut self, info: &FieldInfo<'_>) -> Option<NodeId> {
        let Timing::Started { clock, .. } = self.timing else {
            return None;
        };

        let index = self.ensure_node(info.path);
        let node = &mut self.nodes[index];
        node.return_type = info.return_type.to_string();
        node.parent_type = info.parent_type.to_string();
        node.start_time = nanos_since(clock);
        // Until the field ends, it ends with the request.
        node.end_time = u64::MAX;

        if let Some(PathSegment::Field(response_name)) = info.path.last() {
            if response_name != info.field_name {
                node.original_field_name = info.field_name.to_string();
            }
        }

        Some(NodeId(index))
    }

    pub fn did_resolve_field(&mut self, node: NodeId) {
        let end_time = match self.timing {
            Timing::Started { clock, .. } => nanos_since(clock),
            Timing::Stopped { duration_ns, .. } => duration_ns,
            Timing::Unstarted => return,
        };

        if let Some(node) = self.nodes.get_mut(node.0) {
            node.end_time = end_time.max(node.start_time);
        }
    }

    /// Attaches an error to the node of its path, or to the root node when the path is
    /// missing or was never resolved.
    pub fn add_error(&mut self, path: Option<&ResponsePath>, mut error: trace::Error) {
        if let Timing::Started { clock, .. } = self.timing {
            error.time_ns = nanos_since(clock);
        }

        let index = match path {
            Some(path) => match self.by_path.get(&path.to_key()) {
                Some(&index) => index,
                None => {
                    tracing::warn!("could not find a trace node for path {path}, attaching the error to the root");
                    0
                }
            },
            None => 0,
        };

        self.nodes[index].errors.push(error);
    }

    /// Writes timings and the node tree into `trace`. Field level details are dropped when
    /// `with_fields` is false.
    pub fn finish(mut self, trace: &mut Trace, with_fields: bool) {
        if let Timing::Stopped {
            start_time,
            end_time,
            duration_ns,
        } = self.timing
        {
            trace.start_time = Some(start_time.into());
            trace.end_time = Some(end_time.into());
            trace.duration_ns = duration_ns;
        }

        if with_fields {
            trace.root = Some(self.build_node(0));
        } else if !self.nodes[0].errors.is_empty() {
            trace.root = Some(trace::Node {
                error: std::mem::take(&mut self.nodes[0].errors),
                ..Default::default()
            });
        }
    }

    fn ensure_node(&mut self, path: &ResponsePath) -> usize {
        let key = path.to_key();
        if let Some(&index) = self.by_path.get(&key) {
            return index;
        }

        let parent = match path.parent() {
            Some(parent) => self.ensure_node(&parent),
            None => 0,
        };

        let id = path.last().map(|segment| match segment {
            PathSegment::Field(name) => node::Id::ResponseName(name.clone()),
            PathSegment::Index(index) => node::Id::Index(u32::try_from(*index).unwrap_or(u32::MAX)),
        });

        let index = self.nodes.len();
        self.nodes.push(NodeData {
            id,
            ..Default::default()
        });
        self.nodes[parent].children.push(index);
        self.by_path.insert(key, index);

        index
    }

    fn build_node(&mut self, index: usize) -> trace::Node {
        let data = std::mem::take(&mut self.nodes[index]);

        trace::Node {
            id: data.id,
            r#type: data.return_type,
            start_time: data.start_time,
            end_time: if data.end_time == u64::MAX { data.start_time } else { data.end_time },
            error: data.errors,
            child: data.children.into_iter().map(|child| self.build_node(child)).collect(),
            parent_type: data.parent_type,
            original_field_name: data.original_field_name,
        }
    }
}

fn nanos_since(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
