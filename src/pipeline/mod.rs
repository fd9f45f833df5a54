//! # Pipeline
//!
//! A demand-driven graph of algorithms. Each update runs three passes upstream of the
//! requested node:
//!
//! 1. information: every node publishes metadata about its outputs ([`Information`]),
//! 2. update extent: the request ([`UpdateRequest`]) travels upstream,
//! 3. data: nodes whose request, parameters or inputs changed since their last
//!    execution run [`Algorithm::request_data`].
//!
//! ```
//! use vtk_pipeline::filters::{ContourFilter, ImageSource};
//! use vtk_pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::new();
//! let source = pipeline.add(ImageSource::sphere([16, 16, 16]));
//! let contour = pipeline.add(ContourFilter::with_values(&[0.5]));
//! pipeline.connect(source, 0, contour, 0).unwrap();
//! pipeline.update(contour).unwrap();
//!
//! let surface = pipeline.output(contour, 0).unwrap();
//! assert!(surface.number_of_cells() > 0);
//! ```

mod executive;
mod information;
mod producer;
mod streaming;

pub use executive::{NodeId, Pipeline};
pub use information::{ArrayInformation, Information, Piece, UpdateRequest};
pub use producer::{extract_piece, TrivialProducer};
pub(crate) use producer::array_information;
pub use streaming::CellStreaming;

use crate::data::{DataKind, DataObject};
use crate::object::Observable;
use crate::{Error, Result};

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Downcasting support for boxed algorithms.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A processing node.
///
/// Parameters are set through typed setters that call `modified()`, which is what
/// makes the executive run the node again.
pub trait Algorithm: Observable + AsAny + Send {
    /// class name used in logs
    fn name(&self) -> &'static str;

    fn number_of_input_ports(&self) -> usize {
        1
    }

    fn number_of_output_ports(&self) -> usize {
        1
    }

    /// the kind of data an input port accepts
    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::DataSet
    }

    fn input_is_optional(&self, _port: usize) -> bool {
        false
    }

    /// whether a port takes several connections
    fn input_is_repeatable(&self, _port: usize) -> bool {
        false
    }

    /// The node can work on a piece or sub-extent of its input.
    fn can_stream(&self) -> bool {
        false
    }

    /// Fill `outputs` with metadata. By default every output copies the first input.
    fn request_information(&mut self, inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        if let Some(first) = inputs.first().and_then(|port| port.first()) {
            for out in outputs.iter_mut() {
                *out = first.clone();
                out.data_kind = None;
                out.can_stream = first.can_stream && self.can_stream();
            }
        }
        Ok(())
    }

    /// Translate the request on an output into one request per input connection.
    ///
    /// By default streaming nodes forward the request and the others ask for everything.
    fn request_update_extent(&mut self, request: &UpdateRequest, inputs: &[Vec<Information>]) -> Vec<Vec<UpdateRequest>> {
        let forwarded = if self.can_stream() {
            request.clone()
        } else {
            UpdateRequest {
                time: request.time,
                ..UpdateRequest::whole()
            }
        };
        inputs
            .iter()
            .map(|port| vec![forwarded.clone(); port.len()])
            .collect()
    }

    /// Produce the outputs.
    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()>;
}

/// Inputs, request and output slots handed to [`Algorithm::request_data`].
pub struct ExecutionContext {
    inputs: Vec<Vec<Arc<DataObject>>>,
    outputs: Vec<Option<DataObject>>,
    request: UpdateRequest,
    abort: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub(crate) fn new(
        inputs: Vec<Vec<Arc<DataObject>>>,
        outputs: usize,
        request: UpdateRequest,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inputs,
            outputs: vec![None; outputs],
            request,
            abort,
        }
    }

    /// Standalone context, for running an algorithm outside a [`Pipeline`].
    pub fn standalone(inputs: Vec<Vec<Arc<DataObject>>>, outputs: usize) -> Self {
        Self::new(inputs, outputs, UpdateRequest::whole(), Arc::new(AtomicBool::new(false)))
    }

    /// the first connection on `port`
    pub fn input(&self, port: usize) -> Result<&DataObject> {
        self.input_connection(port, 0)
    }

    pub fn input_connection(&self, port: usize, connection: usize) -> Result<&DataObject> {
        self.inputs
            .get(port)
            .and_then(|p| p.get(connection))
            .map(|d| d.as_ref())
            .ok_or_else(|| Error::pipeline(format!("no input on port {port} connection {connection}")))
    }

    pub fn shared_input(&self, port: usize) -> Result<Arc<DataObject>> {
        self.inputs
            .get(port)
            .and_then(|p| p.first())
            .cloned()
            .ok_or_else(|| Error::pipeline(format!("no input on port {port}")))
    }

    pub fn number_of_connections(&self, port: usize) -> usize {
        self.inputs.get(port).map_or(0, Vec::len)
    }

    pub fn request(&self) -> &UpdateRequest {
        &self.request
    }

    pub fn set_output(&mut self, port: usize, data: impl Into<DataObject>) -> Result<()> {
        let slot = self
            .outputs
            .get_mut(port)
            .ok_or_else(|| Error::pipeline(format!("no output port {port}")))?;
        *slot = Some(data.into());
        Ok(())
    }

    /// Fails once the node has been asked to abort.
    pub fn check_abort(&self) -> Result<()> {
        if self.abort.load(Ordering::SeqCst) {
            return Err(Error::pipeline("aborted"));
        }
        Ok(())
    }

    pub fn take_output(&mut self, port: usize) -> Option<DataObject> {
        self.outputs.get_mut(port).and_then(Option::take)
    }

    pub(crate) fn into_outputs(self) -> Vec<Option<DataObject>> {
        self.outputs
    }
}

/// Run `algorithm` once on `inputs` (one dataset per input port) without a pipeline.
pub fn execute<A: Algorithm + ?Sized>(algorithm: &mut A, inputs: Vec<DataObject>) -> Result<Vec<DataObject>> {
    let inputs = inputs.into_iter().map(|d| vec![Arc::new(d)]).collect();
    let mut ctx = ExecutionContext::standalone(inputs, algorithm.number_of_output_ports());
    algorithm.request_data(&mut ctx)?;
    ctx.into_outputs()
        .into_iter()
        .enumerate()
        .map(|(port, d)| d.ok_or_else(|| Error::pipeline(format!("{} produced no output on port {port}", algorithm.name()))))
        .collect()
}
