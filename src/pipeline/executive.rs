use super::{Algorithm, AsAny, ExecutionContext, Information, UpdateRequest};
use crate::data::DataObject;
use crate::object::{self, EventId};
use crate::{Error, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Index of a node in a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display(fmt = "node#{}", _0)]
pub struct NodeId(pub usize);

struct Node {
    algorithm: Box<dyn Algorithm>,
    /// per input port, the upstream `(node, output port)` connections
    inputs: Vec<Vec<(NodeId, usize)>>,
    outputs: Vec<Option<Arc<DataObject>>>,
    information: Vec<Information>,
    /// time stamp of each output's data
    data_time: Vec<u64>,
    exec_time: u64,
    last_request: Option<UpdateRequest>,
    executions: usize,
    abort: Arc<AtomicBool>,
}

/// Arena of algorithms and their connections.
#[derive(Default)]
pub struct Pipeline {
    nodes: Vec<Node>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|n| n.algorithm.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<A: Algorithm + 'static>(&mut self, algorithm: A) -> NodeId {
        self.add_boxed(Box::new(algorithm))
    }

    pub fn add_boxed(&mut self, algorithm: Box<dyn Algorithm>) -> NodeId {
        let inputs = vec![Vec::new(); algorithm.number_of_input_ports()];
        let outputs = algorithm.number_of_output_ports();
        self.nodes.push(Node {
            algorithm,
            inputs,
            outputs: vec![None; outputs],
            information: vec![Information::default(); outputs],
            data_time: vec![0; outputs],
            exec_time: 0,
            last_request: None,
            executions: 0,
            abort: Arc::new(AtomicBool::new(false)),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| Error::out_of_bounds(format!("{id} of {}", self.nodes.len())))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let len = self.nodes.len();
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| Error::out_of_bounds(format!("{id} of {len}")))
    }

    /// Replace the connections of `dst`'s input port with `src`'s output port.
    pub fn connect(&mut self, src: NodeId, src_port: usize, dst: NodeId, dst_port: usize) -> Result<()> {
        self.check_connection(src, src_port, dst, dst_port)?;
        let node = self.node_mut(dst)?;
        node.inputs[dst_port] = vec![(src, src_port)];
        node.algorithm.modified();
        Ok(())
    }

    /// Append a connection to a repeatable input port.
    pub fn add_connection(&mut self, src: NodeId, src_port: usize, dst: NodeId, dst_port: usize) -> Result<()> {
        self.check_connection(src, src_port, dst, dst_port)?;
        let node = self.node_mut(dst)?;
        if !node.algorithm.input_is_repeatable(dst_port) && !node.inputs[dst_port].is_empty() {
            return Err(Error::pipeline(format!(
                "input port {dst_port} of {} takes a single connection",
                node.algorithm.name()
            )));
        }
        node.inputs[dst_port].push((src, src_port));
        node.algorithm.modified();
        Ok(())
    }

    pub fn disconnect(&mut self, dst: NodeId, dst_port: usize) -> Result<()> {
        let node = self.node_mut(dst)?;
        let port = node
            .inputs
            .get_mut(dst_port)
            .ok_or_else(|| Error::out_of_bounds(format!("input port {dst_port}")))?;
        port.clear();
        node.algorithm.modified();
        Ok(())
    }

    fn check_connection(&self, src: NodeId, src_port: usize, dst: NodeId, dst_port: usize) -> Result<()> {
        let source = self.node(src)?;
        let sink = self.node(dst)?;
        if src_port >= source.outputs.len() {
            return Err(Error::out_of_bounds(format!(
                "{} has no output port {src_port}",
                source.algorithm.name()
            )));
        }
        if dst_port >= sink.inputs.len() {
            return Err(Error::out_of_bounds(format!(
                "{} has no input port {dst_port}",
                sink.algorithm.name()
            )));
        }
        if src == dst || self.is_upstream(dst, src) {
            return Err(Error::pipeline("connection would create a cycle"));
        }
        Ok(())
    }

    /// whether `a` feeds `b`, directly or not
    fn is_upstream(&self, a: NodeId, b: NodeId) -> bool {
        let mut stack = vec![b];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(n) = stack.pop() {
            for &(up, _) in self.nodes[n.0].inputs.iter().flatten() {
                if up == a {
                    return true;
                }
                if !seen[up.0] {
                    seen[up.0] = true;
                    stack.push(up);
                }
            }
        }
        false
    }

    /// Borrow a node's algorithm as its concrete type.
    pub fn algorithm<A: Algorithm + 'static>(&self, id: NodeId) -> Option<&A> {
        let node = self.nodes.get(id.0)?;
        <dyn Algorithm as AsAny>::as_any(&*node.algorithm).downcast_ref::<A>()
    }

    /// Mutably borrow a node's algorithm, e.g. to change parameters.
    pub fn algorithm_mut<A: Algorithm + 'static>(&mut self, id: NodeId) -> Option<&mut A> {
        let node = self.nodes.get_mut(id.0)?;
        <dyn Algorithm as AsAny>::as_any_mut(&mut *node.algorithm).downcast_mut::<A>()
    }

    pub fn dyn_algorithm(&self, id: NodeId) -> Option<&dyn Algorithm> {
        self.nodes.get(id.0).map(|n| n.algorithm.as_ref())
    }

    /// Ask a node to stop: its next execution fails and keeps the previous output.
    pub fn abort(&self, id: NodeId) {
        if let Some(node) = self.nodes.get(id.0) {
            node.abort.store(true, Ordering::SeqCst);
        }
    }

    pub fn output(&self, id: NodeId, port: usize) -> Option<Arc<DataObject>> {
        self.nodes.get(id.0)?.outputs.get(port)?.clone()
    }

    pub fn information(&self, id: NodeId, port: usize) -> Option<&Information> {
        self.nodes.get(id.0)?.information.get(port)
    }

    /// time stamp of the data currently on an output port (0 before the first execution)
    pub fn data_time(&self, id: NodeId, port: usize) -> u64 {
        self.nodes
            .get(id.0)
            .and_then(|n| n.data_time.get(port).copied())
            .unwrap_or(0)
    }

    /// number of times the node's `request_data` ran successfully
    pub fn executions(&self, id: NodeId) -> usize {
        self.nodes.get(id.0).map_or(0, |n| n.executions)
    }

    /// Bring output port 0 of `id` up to date with the whole extent.
    pub fn update(&mut self, id: NodeId) -> Result<()> {
        self.update_with(id, 0, UpdateRequest::whole())
    }

    pub fn update_with(&mut self, id: NodeId, port: usize, request: UpdateRequest) -> Result<()> {
        if port >= self.node(id)?.outputs.len() {
            return Err(Error::out_of_bounds(format!("output port {port}")));
        }
        self.update_information(id)?;
        self.update_node(id, request)
    }

    /// Run the information pass up to `id`.
    pub fn update_information(&mut self, id: NodeId) -> Result<()> {
        let upstream: Vec<Vec<(NodeId, usize)>> = self.node(id)?.inputs.clone();
        for &(up, _) in upstream.iter().flatten() {
            self.update_information(up)?;
        }
        let input_info = self.gather_information(&upstream);
        let node = self.node_mut(id)?;
        tracing::trace!(node = %id, algorithm = node.algorithm.name(), "request information");
        let mut outputs = std::mem::take(&mut node.information);
        let result = node.algorithm.request_information(&input_info, &mut outputs);
        node.information = outputs;
        result.map_err(|e| Self::fail(node, id, e))
    }

    fn gather_information(&self, upstream: &[Vec<(NodeId, usize)>]) -> Vec<Vec<Information>> {
        upstream
            .iter()
            .map(|port| {
                port.iter()
                    .map(|&(up, p)| self.nodes[up.0].information.get(p).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    fn update_node(&mut self, id: NodeId, request: UpdateRequest) -> Result<()> {
        let upstream: Vec<Vec<(NodeId, usize)>> = self.node(id)?.inputs.clone();
        let input_info = self.gather_information(&upstream);

        // update extent pass
        let node = self.node_mut(id)?;
        tracing::trace!(node = %id, algorithm = node.algorithm.name(), ?request, "request update extent");
        for (port, connections) in upstream.iter().enumerate() {
            if connections.is_empty() && !node.algorithm.input_is_optional(port) {
                let e = Error::pipeline(format!("{} needs an input on port {port}", node.algorithm.name()));
                return Err(Self::fail(node, id, e));
            }
        }
        let upstream_requests = node.algorithm.request_update_extent(&request, &input_info);

        for (port, connections) in upstream.iter().enumerate() {
            for (c, &(up, _)) in connections.iter().enumerate() {
                let req = upstream_requests
                    .get(port)
                    .and_then(|r| r.get(c))
                    .cloned()
                    .unwrap_or_default();
                self.update_node(up, req)?;
            }
        }

        // data pass
        let mut inputs = Vec::with_capacity(upstream.len());
        let mut newest_input = 0;
        for (port, connections) in upstream.iter().enumerate() {
            let mut port_data = Vec::with_capacity(connections.len());
            for &(up, up_port) in connections {
                let data = self.nodes[up.0].outputs.get(up_port).cloned().flatten();
                newest_input = newest_input.max(self.data_time(up, up_port));
                match data {
                    Some(data) => {
                        let expected = self.nodes[id.0].algorithm.input_kind(port);
                        if !expected.accepts(data.kind()) {
                            let node = &mut self.nodes[id.0];
                            let e = Error::pipeline(format!(
                                "{} port {port} expects {expected:?}, upstream produced {}",
                                node.algorithm.name(),
                                data.type_name()
                            ));
                            return Err(Self::fail(node, id, e));
                        }
                        port_data.push(data);
                    }
                    None => {
                        let node = &mut self.nodes[id.0];
                        let e = Error::pipeline(format!("{} has no upstream output on port {port}", node.algorithm.name()));
                        return Err(Self::fail(node, id, e));
                    }
                }
            }
            inputs.push(port_data);
        }

        let node = self.node_mut(id)?;
        let stale = node.last_request.as_ref() != Some(&request)
            || node.algorithm.mtime() > node.exec_time
            || newest_input > node.exec_time
            || node.outputs.iter().any(Option::is_none);
        if !stale {
            tracing::trace!(node = %id, algorithm = node.algorithm.name(), "up to date");
            return Ok(());
        }

        let name = node.algorithm.name();
        node.algorithm.invoke_event(EventId::StartEvent, None);
        node.algorithm.object_mut().clear_error();
        let started = Instant::now();
        let mut ctx = ExecutionContext::new(inputs, node.outputs.len(), request.clone(), Arc::clone(&node.abort));
        let result = ctx
            .check_abort()
            .and_then(|_| node.algorithm.request_data(&mut ctx));
        node.abort.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            return Err(Self::fail(node, id, e));
        }

        let outputs = ctx.into_outputs();
        if let Some(port) = outputs.iter().position(Option::is_none) {
            let e = Error::pipeline(format!("{name} produced no output on port {port}"));
            return Err(Self::fail(node, id, e));
        }
        let stamp = object::next_time_stamp();
        for (slot, data) in node.outputs.iter_mut().zip(outputs) {
            *slot = data.map(Arc::new);
        }
        node.data_time.iter_mut().for_each(|t| *t = stamp);
        node.exec_time = stamp;
        node.last_request = Some(request);
        node.executions += 1;
        tracing::debug!(
            node = %id,
            algorithm = name,
            exec_time = stamp,
            elapsed_us = started.elapsed().as_micros() as u64,
            "executed"
        );
        node.algorithm.invoke_event(EventId::EndEvent, None);
        Ok(())
    }

    /// Report `error` on the node's event bus and turn it into a pipeline error.
    fn fail(node: &mut Node, id: NodeId, error: Error) -> Error {
        let message = format!("{}: {error}", node.algorithm.name());
        node.abort.store(false, Ordering::SeqCst);
        node.algorithm.object_mut().error(message.clone());
        tracing::warn!(node = %id, "execution failed");
        match error {
            Error::Pipeline(_) => error,
            _ => Error::Pipeline(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataKind, ImageData, Table};
    use crate::object::{Object, Observable};
    use crate::pipeline::TrivialProducer;
    use crate::utils::impl_observable;
    use std::sync::Mutex;

    /// Adds a constant to the point scalars of an image.
    struct Shift {
        object: Object,
        amount: f64,
        fail: bool,
    }

    impl_observable!(Shift);

    impl Shift {
        fn new(amount: f64) -> Self {
            Self {
                object: Object::new(),
                amount,
                fail: false,
            }
        }

        fn set_amount(&mut self, amount: f64) {
            self.amount = amount;
            self.modified();
        }
    }

    impl Algorithm for Shift {
        fn name(&self) -> &'static str {
            "Shift"
        }

        fn input_kind(&self, _port: usize) -> DataKind {
            DataKind::Image
        }

        fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
            if self.fail {
                return Err(Error::invalid_argument("told to fail"));
            }
            let mut image = ctx
                .input(0)?
                .as_image()
                .cloned()
                .ok_or_else(|| Error::pipeline("not an image"))?;
            let amount = self.amount;
            let shifted: Vec<f64> = image
                .point_data
                .scalars()
                .map(|s| s.values_as_f64().iter().map(|v| v + amount).collect())
                .unwrap_or_default();
            image.point_data.set_scalars(crate::DataArray::from_vec("s", 1, shifted)?)?;
            ctx.set_output(0, image)
        }
    }

    fn image() -> ImageData {
        let mut image = ImageData::with_dimensions([2, 2, 1], [0.0; 3], [1.0; 3]);
        image.fill_point_scalars("s", |p| p[0]).unwrap();
        image
    }

    fn chain() -> (Pipeline, NodeId, NodeId, NodeId) {
        let mut p = Pipeline::new();
        let src = p.add(TrivialProducer::new(image()));
        let a = p.add(Shift::new(1.0));
        let b = p.add(Shift::new(10.0));
        p.connect(src, 0, a, 0).unwrap();
        p.connect(a, 0, b, 0).unwrap();
        (p, src, a, b)
    }

    fn scalars(p: &Pipeline, id: NodeId) -> Vec<f64> {
        p.output(id, 0).unwrap().point_data().unwrap().scalars().unwrap().values_as_f64()
    }

    #[test]
    fn executes_only_when_stale() {
        let (mut p, src, a, b) = chain();
        p.update(b).unwrap();
        assert_eq!(scalars(&p, b), vec![11.0, 12.0, 11.0, 12.0]);
        assert_eq!((p.executions(a), p.executions(b)), (1, 1));

        p.update(b).unwrap();
        assert_eq!((p.executions(a), p.executions(b)), (1, 1));

        p.algorithm_mut::<Shift>(b).unwrap().set_amount(20.0);
        p.update(b).unwrap();
        assert_eq!((p.executions(a), p.executions(b)), (1, 2));

        p.algorithm_mut::<Shift>(a).unwrap().set_amount(2.0);
        p.update(b).unwrap();
        assert_eq!((p.executions(a), p.executions(b)), (2, 3));
        assert_eq!(scalars(&p, b), vec![22.0, 23.0, 22.0, 23.0]);

        assert!(p.data_time(b, 0) >= p.data_time(a, 0));
        assert!(p.data_time(a, 0) >= p.data_time(src, 0));
    }

    #[test]
    fn upstream_end_precedes_downstream_start() {
        let (mut p, _, a, b) = chain();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (id, name) in [(a, "a"), (b, "b")] {
            let l = Arc::clone(&log);
            p.dyn_algorithm(id).unwrap().object().observers().add(EventId::AnyEvent, 0.0, move |e| {
                if matches!(e.id, EventId::StartEvent | EventId::EndEvent) {
                    l.lock().unwrap().push(format!("{name}:{}", e.id));
                }
            });
        }
        p.update(b).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a:StartEvent", "a:EndEvent", "b:StartEvent", "b:EndEvent"]);
    }

    #[test]
    fn failure_keeps_previous_output() {
        let (mut p, _, a, b) = chain();
        p.update(b).unwrap();
        let before = p.output(b, 0).unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&errors);
        p.dyn_algorithm(a).unwrap().object().observers().add(EventId::ErrorEvent, 0.0, move |event| {
            e.lock().unwrap().push(event.message().unwrap_or_default().to_string());
        });
        {
            let shift = p.algorithm_mut::<Shift>(a).unwrap();
            shift.fail = true;
            shift.modified();
        }
        assert!(matches!(p.update(b), Err(Error::Pipeline(_))));
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(errors.lock().unwrap()[0].contains("told to fail"));
        assert!(Arc::ptr_eq(&before, &p.output(b, 0).unwrap()));
    }

    #[test]
    fn abort_fails_once() {
        let (mut p, _, a, b) = chain();
        p.abort(a);
        assert!(p.update(b).is_err());
        p.update(b).unwrap();
        assert_eq!(p.executions(a), 1);
    }

    #[test]
    fn incompatible_input_is_a_pipeline_error() {
        let mut p = Pipeline::new();
        let src = p.add(TrivialProducer::new(Table::new()));
        let shift = p.add(Shift::new(1.0));
        p.connect(src, 0, shift, 0).unwrap();
        assert!(matches!(p.update(shift), Err(Error::Pipeline(_))));
    }

    #[test]
    fn cycles_and_missing_inputs_are_rejected() {
        let (mut p, _, a, b) = chain();
        assert!(p.connect(b, 0, a, 0).is_err());
        let lonely = p.add(Shift::new(0.0));
        assert!(p.update(lonely).is_err());
    }
}
