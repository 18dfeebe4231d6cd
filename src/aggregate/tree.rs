//! Builds the reportable region tree (spec.md §6 `RegionData`) out of
//! resolved command buffers, and the pipeline-attribution visitor that
//! produces the per-frame top-pipelines list.

use std::collections::HashMap;

use crate::arena::{Arena, ArenaIndex};
use crate::command::{BindPoint, CommandKind, PipelineFingerprint, PipelineRecord, RenderPassRecord, SubpassContents};
use crate::submit::resolver::{ResolvedCommand, ResolvedCommandBuffer};

/// `regionType` discriminant from spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Frame,
    SubmitBatch,
    SubmitInfo,
    CommandBuffer,
    RenderPass,
    Subpass,
    Pipeline,
    Command,
}

/// Type-dependent payload carried by a region node.
#[derive(Debug, Clone)]
pub enum RegionProperties {
    Frame {
        index: u64,
    },
    SubmitBatch {
        queue_family: u32,
    },
    SubmitInfo,
    CommandBuffer {
        degraded: bool,
    },
    RenderPass {
        name: Option<String>,
    },
    Subpass {
        index: u32,
        contents: SubpassContents,
    },
    Pipeline {
        fingerprint: PipelineFingerprint,
        name: Option<String>,
    },
    Command {
        kind: CommandKind,
    },
}

/// One node of the reportable tree. `duration_ms` is `0.0` and
/// `unresolved = true` when the underlying timestamps could not be
/// resolved (a degraded command buffer), per spec.md §7 "missing data is
/// marked on the node rather than omitted".
#[derive(Debug, Clone)]
pub struct RegionNode {
    pub kind: RegionKind,
    pub properties: RegionProperties,
    pub duration_ms: f64,
    pub unresolved: bool,
    pub begin_duration_ms: Option<f64>,
    pub end_duration_ms: Option<f64>,
    pub children: Vec<RegionNode>,
}

impl RegionNode {
    fn leaf(kind: RegionKind, properties: RegionProperties, duration_ms: f64, unresolved: bool) -> Self {
        Self {
            kind,
            properties,
            duration_ms,
            unresolved,
            begin_duration_ms: None,
            end_duration_ms: None,
            children: Vec::new(),
        }
    }
}

fn ns_to_ms(ns: f64) -> f64 {
    ns / 1.0e6
}

/// Which bind point a drawable command's ticks should attribute to, or
/// `None` if the command does not participate in pipeline grouping at all
/// (render-pass control commands, copies, debug labels, ...).
fn attribution_bind_point(kind: &CommandKind) -> Option<BindPoint> {
    match kind {
        CommandKind::Draw { .. } | CommandKind::DrawIndexed { .. } | CommandKind::DrawIndirect { .. } => {
            Some(BindPoint::Graphics)
        }
        CommandKind::Dispatch { .. } | CommandKind::DispatchIndirect => Some(BindPoint::Compute),
        // Ray tracing is attributed using the same mechanism as compute: a
        // dedicated bind-point slot tracked identically by the visitor.
        CommandKind::TraceRays { .. } | CommandKind::BuildAccelerationStructure { .. } => Some(BindPoint::RayTracing),
        _ => None,
    }
}

/// Accumulates per-pipeline-fingerprint tick totals across a frame,
/// preserving first-seen order for stable tie-breaking (spec.md §4.7.2).
#[derive(Default)]
pub struct PipelineVisitor {
    order: Vec<PipelineFingerprint>,
    totals_ns: HashMap<PipelineFingerprint, f64>,
    names: HashMap<PipelineFingerprint, Option<String>>,
}

impl PipelineVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn credit(&mut self, fingerprint: PipelineFingerprint, ns: f64, name: Option<String>) {
        if !self.totals_ns.contains_key(&fingerprint) {
            self.order.push(fingerprint);
            self.names.insert(fingerprint, name);
        }
        *self.totals_ns.entry(fingerprint).or_insert(0.0) += ns;
    }

    /// The top-pipelines list in stable first-seen order.
    pub fn into_ranked(self) -> Vec<(PipelineFingerprint, Option<String>, f64)> {
        self.order
            .into_iter()
            .map(|fp| {
                let total = self.totals_ns[&fp];
                let name = self.names[&fp].clone();
                (fp, name, ns_to_ms(total))
            })
            .collect()
    }
}

/// Per bind-point "currently bound pipeline" state replayed over a flat
/// command sequence. A fresh instance is used per command-buffer scope;
/// secondary command buffers recursed into via `execute-commands` inherit
/// the primary's state only if the caller passes the same visitor context
/// down (callers decide this per spec.md's inheritance note — this crate's
/// tree builder always starts secondaries with independent bind state,
/// matching the common case of secondaries with `RENDER_PASS_CONTINUE`
/// re-establishing their own pipeline before drawing).
#[derive(Default, Clone, Copy)]
struct BoundPipelineState {
    graphics: Option<PipelineFingerprint>,
    compute: Option<PipelineFingerprint>,
    ray_tracing: Option<PipelineFingerprint>,
}

impl BoundPipelineState {
    fn slot(&self, bind_point: BindPoint) -> Option<PipelineFingerprint> {
        match bind_point {
            BindPoint::Graphics => self.graphics,
            BindPoint::Compute => self.compute,
            BindPoint::RayTracing => self.ray_tracing,
        }
    }

    fn set(&mut self, bind_point: BindPoint, fingerprint: PipelineFingerprint) {
        match bind_point {
            BindPoint::Graphics => self.graphics = Some(fingerprint),
            BindPoint::Compute => self.compute = Some(fingerprint),
            BindPoint::RayTracing => self.ray_tracing = Some(fingerprint),
        }
    }
}

struct PipelineGroup {
    fingerprint: PipelineFingerprint,
    name: Option<String>,
    children: Vec<RegionNode>,
}

/// Walks a flat resolved-command sequence, synthesizing `Pipeline` region
/// nodes by grouping consecutive attributable commands that share the
/// active pipeline, and crediting the visitor. Non-attributable commands
/// (render-pass control, copies, debug labels, execute-commands) flush any
/// open group and appear as direct siblings.
///
/// `resolved_by_index` must contain every secondary command-buffer record
/// transitively referenced by `execute-commands` in this sequence.
fn build_flat_sequence(
    commands: &[ResolvedCommand],
    pipelines: &Arena<PipelineRecord>,
    resolved_by_index: &HashMap<ArenaIndex, ResolvedCommandBuffer>,
    bound: &mut BoundPipelineState,
    visitor: &mut PipelineVisitor,
) -> Vec<RegionNode> {
    let mut nodes = Vec::new();
    let mut open_group: Option<PipelineGroup> = None;
    let mut pipeline_names: HashMap<PipelineFingerprint, Option<String>> = HashMap::new();

    let mut flush = |group: &mut Option<PipelineGroup>, nodes: &mut Vec<RegionNode>| {
        if let Some(g) = group.take() {
            let total_ms: f64 = g.children.iter().map(|c| c.duration_ms).sum();
            let unresolved = g.children.iter().any(|c| c.unresolved);
            nodes.push(RegionNode {
                kind: RegionKind::Pipeline,
                properties: RegionProperties::Pipeline {
                    fingerprint: g.fingerprint,
                    name: g.name,
                },
                duration_ms: total_ms,
                unresolved,
                begin_duration_ms: None,
                end_duration_ms: None,
                children: g.children,
            });
        }
    };

    for resolved in commands {
        let kind = resolved.source.kind.clone();

        if let CommandKind::BindPipeline {
            bind_point,
            pipeline,
            fingerprint,
        } = &kind
        {
            bound.set(*bind_point, *fingerprint);
            let name = pipelines.get(*pipeline).and_then(|p| p.name.clone());
            pipeline_names.insert(*fingerprint, name);
            continue;
        }

        if let CommandKind::ExecuteCommands { secondaries } = &kind {
            flush(&mut open_group, &mut nodes);
            for secondary_index in secondaries {
                if let Some(secondary) = resolved_by_index.get(secondary_index) {
                    let mut secondary_bound = BoundPipelineState::default();
                    let children =
                        build_flat_sequence(&secondary.commands, pipelines, resolved_by_index, &mut secondary_bound, visitor);
                    let total_ms: f64 = children.iter().map(|c| c.duration_ms).sum();
                    nodes.push(RegionNode {
                        kind: RegionKind::CommandBuffer,
                        properties: RegionProperties::CommandBuffer {
                            degraded: secondary.degraded,
                        },
                        duration_ms: secondary.duration_ns.map(ns_to_ms).unwrap_or(total_ms),
                        unresolved: secondary.duration_ns.is_none(),
                        begin_duration_ms: None,
                        end_duration_ms: None,
                        children,
                    });
                }
            }
            continue;
        }

        let command_duration_ms = resolved.duration_ns.map(ns_to_ms).unwrap_or(0.0);
        let command_unresolved = resolved.duration_ns.is_none();
        let begin_duration_ms = resolved.segment_duration_ns.map(ns_to_ms);

        match attribution_bind_point(&kind) {
            Some(bind_point) => {
                let fingerprint = bound.slot(bind_point).unwrap_or(PipelineFingerprint(0));
                let name = pipeline_names.get(&fingerprint).cloned().flatten();
                if open_group.as_ref().map(|g| g.fingerprint) != Some(fingerprint) {
                    flush(&mut open_group, &mut nodes);
                    open_group = Some(PipelineGroup {
                        fingerprint,
                        name: name.clone(),
                        children: Vec::new(),
                    });
                }
                visitor.credit(fingerprint, resolved.duration_ns.unwrap_or(0.0), name);
                if let Some(group) = open_group.as_mut() {
                    group.children.push(RegionNode::leaf(
                        RegionKind::Command,
                        RegionProperties::Command { kind: kind.clone() },
                        command_duration_ms,
                        command_unresolved,
                    ));
                }
            }
            None => {
                flush(&mut open_group, &mut nodes);
                let mut node = RegionNode::leaf(
                    RegionKind::Command,
                    RegionProperties::Command { kind: kind.clone() },
                    command_duration_ms,
                    command_unresolved,
                );
                node.begin_duration_ms = begin_duration_ms;
                node.end_duration_ms = resolved.segment_duration_ns.map(ns_to_ms);
                nodes.push(node);
            }
        }
    }
    flush(&mut open_group, &mut nodes);
    nodes
}

/// Builds the `render-pass → subpass → ...` sub-tree for one primary
/// command buffer's resolved commands, or a flat `pipeline → command`
/// sequence when no render pass is active.
pub fn build_command_buffer_tree(
    resolved: &ResolvedCommandBuffer,
    pipelines: &Arena<PipelineRecord>,
    render_passes: &Arena<RenderPassRecord>,
    resolved_by_index: &HashMap<ArenaIndex, ResolvedCommandBuffer>,
    visitor: &mut PipelineVisitor,
) -> RegionNode {
    let mut children = Vec::new();
    let mut bound = BoundPipelineState::default();
    let mut i = 0;
    while i < resolved.commands.len() {
        match &resolved.commands[i].source.kind {
            CommandKind::BeginRenderPass { render_pass, .. } => {
                let rp_index = *render_pass;
                let rp_name = render_passes.get(rp_index).and_then(|rp| rp.name.clone());
                let begin_duration_ms = resolved.commands[i].segment_duration_ns.map(ns_to_ms);
                let mut j = i + 1;
                let mut subpasses: Vec<(u32, SubpassContents, Vec<ResolvedCommand>)> = vec![(0, SubpassContents::Inline, Vec::new())];
                let mut end_duration_ms = None;
                loop {
                    if j >= resolved.commands.len() {
                        break;
                    }
                    match &resolved.commands[j].source.kind {
                        CommandKind::NextSubpass { subpass_index, contents } => {
                            subpasses.push((*subpass_index, *contents, Vec::new()));
                        }
                        CommandKind::EndRenderPass => {
                            end_duration_ms = resolved.commands[j].segment_duration_ns.map(ns_to_ms);
                            j += 1;
                            break;
                        }
                        _ => {
                            subpasses.last_mut().unwrap().2.push(resolved.commands[j].clone());
                        }
                    }
                    j += 1;
                }

                let subpass_nodes: Vec<RegionNode> = subpasses
                    .into_iter()
                    .map(|(index, contents, cmds)| {
                        let sub_children = build_flat_sequence(&cmds, pipelines, resolved_by_index, &mut bound, visitor);
                        let duration_ms: f64 = sub_children.iter().map(|c| c.duration_ms).sum();
                        let unresolved = sub_children.iter().any(|c| c.unresolved);
                        RegionNode {
                            kind: RegionKind::Subpass,
                            properties: RegionProperties::Subpass { index, contents },
                            duration_ms,
                            unresolved,
                            begin_duration_ms: None,
                            end_duration_ms: None,
                            children: sub_children,
                        }
                    })
                    .collect();

                let duration_ms: f64 = subpass_nodes.iter().map(|s| s.duration_ms).sum();
                children.push(RegionNode {
                    kind: RegionKind::RenderPass,
                    properties: RegionProperties::RenderPass { name: rp_name },
                    duration_ms,
                    unresolved: subpass_nodes.iter().any(|s| s.unresolved),
                    begin_duration_ms,
                    end_duration_ms,
                    children: subpass_nodes,
                });
                i = j;
            }
            _ => {
                let mut run = Vec::new();
                while i < resolved.commands.len() && !matches!(resolved.commands[i].source.kind, CommandKind::BeginRenderPass { .. }) {
                    run.push(resolved.commands[i].clone());
                    i += 1;
                }
                children.extend(build_flat_sequence(&run, pipelines, resolved_by_index, &mut bound, visitor));
            }
        }
    }

    let duration_ms = resolved.duration_ns.map(ns_to_ms).unwrap_or_else(|| children.iter().map(|c| c.duration_ms).sum());
    RegionNode {
        kind: RegionKind::CommandBuffer,
        properties: RegionProperties::CommandBuffer { degraded: resolved.degraded },
        duration_ms,
        unresolved: resolved.duration_ns.is_none(),
        begin_duration_ms: None,
        end_duration_ms: None,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::resolver::ResolvedCommand;
    use crate::command::Command;

    fn draw_command(begin: u64, end: u64) -> ResolvedCommand {
        ResolvedCommand {
            source: Command::new(
                CommandKind::Draw {
                    vertex_count: 3,
                    instance_count: 1,
                },
                TimestampRange { begin: Some(begin), end: Some(end) },
            ),
            duration_ns: Some((end - begin) as f64 * 10.0),
            segment_duration_ns: None,
        }
    }

    use crate::command::TimestampRange;

    #[test]
    fn consecutive_draws_under_one_pipeline_group_into_one_pipeline_node() {
        let pipelines: Arena<PipelineRecord> = Arena::new();
        let render_passes: Arena<RenderPassRecord> = Arena::new();
        let resolved_by_index = HashMap::new();
        let mut visitor = PipelineVisitor::new();
        let mut bound = BoundPipelineState::default();
        bound.set(BindPoint::Graphics, PipelineFingerprint(7));

        let commands = vec![draw_command(0, 5), draw_command(5, 9)];
        let nodes = build_flat_sequence(&commands, &pipelines, &resolved_by_index, &mut bound, &mut visitor);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, RegionKind::Pipeline);
        assert_eq!(nodes[0].children.len(), 2);
    }

    #[test]
    fn pipeline_visitor_sums_ticks_in_first_seen_order() {
        let mut visitor = PipelineVisitor::new();
        visitor.credit(PipelineFingerprint(2), 100.0, None);
        visitor.credit(PipelineFingerprint(1), 50.0, None);
        visitor.credit(PipelineFingerprint(2), 25.0, None);

        let ranked = visitor.into_ranked();
        assert_eq!(ranked[0].0, PipelineFingerprint(2));
        assert_eq!(ranked[1].0, PipelineFingerprint(1));
        assert!((ranked[0].2 - ns_to_ms(125.0)).abs() < 1e-9);
    }
}
