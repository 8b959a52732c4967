//! Command recording
//!
//! Command buffers are recorded on the host into a backend-neutral command
//! list. Closing a buffer freezes its commands into [`RecordedCommands`], a
//! cheaply clonable handle that devices consume at submission. A closed buffer
//! must be reset before it can record again, and it may only be reset once the
//! device has retired every submission that referenced it.

use std::fmt;
use std::sync::Arc;

use crate::config::Viewport;
use crate::render::device::ResourceId;
use crate::render::error::{RenderError, RenderResult};

/// Usage state of a GPU resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Bound as a depth target and written by depth tests
    DepthWritable,
    /// Sampled by pixel shaders
    ShaderReadable,
    /// Bound as a color render target
    RenderTarget,
    /// Owned by the presentation engine
    Present,
    /// Host-visible upload memory
    GenericRead,
}

/// Pipeline configuration a command buffer records against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Color pass from the camera, samples the shadow map
    Scene,
    /// Depth-only pass from the shadow-casting light
    Shadow,
}

/// Root-signature slot a descriptor table binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootSlot {
    /// Diffuse texture of the current draw
    DiffuseTexture,
    /// Per-pass constant buffer
    Constants,
    /// Shadow map shader view
    ShadowMap,
    /// Static samplers
    Samplers,
}

/// What a descriptor table points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewBinding {
    /// Null view; sampling reads zeros
    Null,
    /// Shader view of a texture
    Texture(ResourceId),
    /// Constant buffer view
    ConstantBuffer(ResourceId),
    /// Sampler heap
    Samplers,
}

/// Resource-state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    /// Resource changing state
    pub resource: ResourceId,
    /// State the resource is expected to be in
    pub before: ResourceState,
    /// State the resource moves to
    pub after: ResourceState,
}

/// A single recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select the pipeline state object
    SetPipeline(PipelineKind),
    /// Viewport and matching scissor rectangle
    SetViewport(Viewport),
    /// Bind the shared vertex buffer
    SetVertexBuffer {
        /// Vertex buffer
        buffer: ResourceId,
        /// Bytes per vertex
        stride: u32,
    },
    /// Bind the shared index buffer
    SetIndexBuffer(ResourceId),
    /// Point a root slot at a view
    BindTable {
        /// Root slot
        slot: RootSlot,
        /// View bound to the slot
        view: ViewBinding,
    },
    /// Set output targets; `color: None` disables color writes
    SetRenderTargets {
        /// Color target
        color: Option<ResourceId>,
        /// Depth target
        depth: ResourceId,
    },
    /// Fill a color target
    ClearRenderTarget {
        /// Target to clear
        target: ResourceId,
        /// Clear color
        color: [f32; 4],
    },
    /// Fill a depth target
    ClearDepth {
        /// Target to clear
        target: ResourceId,
        /// Clear depth
        depth: f32,
    },
    /// Indexed, single-instance draw
    DrawIndexed {
        /// Number of indices
        index_count: u32,
        /// First index
        start_index: u32,
        /// Value added to each index
        base_vertex: i32,
    },
    /// Resource-state transition
    Barrier(Transition),
    /// Open a named debug region
    BeginEvent(&'static str),
    /// Close the innermost debug region
    EndEvent,
}

/// Frozen command list produced by [`CommandBuffer::close`]
#[derive(Clone)]
pub struct RecordedCommands {
    label: Arc<str>,
    commands: Arc<[Command]>,
}

impl RecordedCommands {
    /// Debug label of the command buffer that produced this list
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Recorded commands in order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of indexed draws in the list
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::DrawIndexed { .. }))
            .count()
    }
}

impl fmt::Debug for RecordedCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordedCommands")
            .field("label", &self.label)
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordingState {
    Recording,
    Closed,
}

/// Host-side command buffer
#[derive(Debug)]
pub struct CommandBuffer {
    label: Arc<str>,
    pipeline: PipelineKind,
    state: RecordingState,
    commands: Vec<Command>,
    recorded: Option<RecordedCommands>,
}

impl CommandBuffer {
    /// Create a closed command buffer bound to `pipeline`
    pub fn new(label: impl Into<String>, pipeline: PipelineKind) -> Self {
        Self {
            label: Arc::from(label.into()),
            pipeline,
            state: RecordingState::Closed,
            commands: Vec::new(),
            recorded: None,
        }
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pipeline this buffer starts recording with after a reset
    pub const fn pipeline(&self) -> PipelineKind {
        self.pipeline
    }

    /// Whether the buffer has been closed
    pub fn is_closed(&self) -> bool {
        self.state == RecordingState::Closed
    }

    /// Commands recorded since the last reset
    pub fn commands(&self) -> &[Command] {
        match &self.recorded {
            Some(recorded) if self.is_closed() => recorded.commands(),
            _ => &self.commands,
        }
    }

    /// Discard previous contents and start recording with the bound pipeline
    pub fn reset(&mut self) {
        self.commands.clear();
        self.recorded = None;
        self.state = RecordingState::Recording;
        self.commands.push(Command::SetPipeline(self.pipeline));
    }

    /// Append a command
    pub fn record(&mut self, command: Command) -> RenderResult<()> {
        if self.is_closed() {
            return Err(RenderError::CommandBufferClosed {
                label: self.label.to_string(),
            });
        }
        self.commands.push(command);
        Ok(())
    }

    /// Append an indexed draw
    pub fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) -> RenderResult<()> {
        self.record(Command::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        })
    }

    /// Append a resource-state transition
    pub fn transition(
        &mut self,
        resource: ResourceId,
        before: ResourceState,
        after: ResourceState,
    ) -> RenderResult<()> {
        self.record(Command::Barrier(Transition {
            resource,
            before,
            after,
        }))
    }

    /// Bind a view to a root slot
    pub fn bind_table(&mut self, slot: RootSlot, view: ViewBinding) -> RenderResult<()> {
        self.record(Command::BindTable { slot, view })
    }

    /// Finish recording and freeze the commands for submission
    pub fn close(&mut self) -> RenderResult<()> {
        if self.is_closed() {
            return Err(RenderError::CommandBufferClosed {
                label: self.label.to_string(),
            });
        }

        let commands: Arc<[Command]> = std::mem::take(&mut self.commands).into();
        self.recorded = Some(RecordedCommands {
            label: Arc::clone(&self.label),
            commands,
        });
        self.state = RecordingState::Closed;
        Ok(())
    }

    /// Submission handle for the closed contents
    pub fn recorded(&self) -> RenderResult<RecordedCommands> {
        match (&self.recorded, self.state) {
            (Some(recorded), RecordingState::Closed) => Ok(recorded.clone()),
            _ => Err(RenderError::CommandBufferNotClosed {
                label: self.label.to_string(),
            }),
        }
    }
}
