// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bitvec::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

pub const DEFAULT_TOP_MODULE: &str = "noc";
const DEFAULT_VCD_HEADER: &str = "aernoc VCD";

/// Traces the signals of the network into a value change dump.
///
/// Signals are declared in a hierarchy of scopes, one per router, and looked
/// up by their scoped name when they change. Unchanged values are not
/// written again. The first I/O error is logged and puts the writer in an
/// error state in which it ignores every further request.
pub struct VcdWriter {
    writer: vcd::Writer<Box<dyn io::Write>>,
    is_error_state: bool,
    scope_stack: Vec<String>,
    id_map: HashMap<String, vcd::IdCode>,
    width_map: HashMap<vcd::IdCode, usize>,
    last_value_map: HashMap<vcd::IdCode, BitBox<usize, Lsb0>>,
    timestamp: u64,
}

pub struct VcdTraceScope {
    writer: Rc<RefCell<VcdWriter>>,
    scope: String,
}

impl Drop for VcdTraceScope {
    fn drop(&mut self) {
        self.writer.borrow_mut().leave_scope(self.scope.as_str());
    }
}

pub struct VcdDeclScope {
    writer: Rc<RefCell<VcdWriter>>,
    scope: String,
}

impl Drop for VcdDeclScope {
    fn drop(&mut self) {
        self.writer.borrow_mut().upscope(self.scope.as_str());
    }
}

impl VcdWriter {
    pub fn new<P: AsRef<Path>>(dst: P) -> io::Result<Self> {
        let dst_file = fs::File::create(dst.as_ref())?;
        log::debug!("VCD file: {}", dst.as_ref().display());
        Ok(Self::from_writer(Box::new(io::BufWriter::new(dst_file))))
    }

    pub fn from_writer(writer: Box<dyn io::Write>) -> Self {
        Self {
            writer: vcd::Writer::new(writer),
            is_error_state: false,
            scope_stack: vec![],
            id_map: HashMap::new(),
            width_map: HashMap::new(),
            last_value_map: HashMap::new(),
            timestamp: 0,
        }
    }

    fn vcd_error_handler(&mut self, err: io::Error) {
        if !self.is_error_state {
            self.is_error_state = true;
            log::error!("VCD writing failed with error {:?}", err)
        }
    }

    pub fn is_error_state(&self) -> bool {
        self.is_error_state
    }

    pub fn managed_decl_scope<T>(writer: Rc<RefCell<VcdWriter>>, scope: &T) -> VcdDeclScope
    where
        T: Display + ?Sized,
    {
        writer.borrow_mut().add_module(scope);
        VcdDeclScope {
            writer: Rc::clone(&writer),
            scope: scope.to_string(),
        }
    }

    pub fn managed_trace_scope<T>(writer: Rc<RefCell<VcdWriter>>, scope: &T) -> VcdTraceScope
    where
        T: Display + ?Sized,
    {
        writer.borrow_mut().enter_scope(scope);
        VcdTraceScope {
            writer: Rc::clone(&writer),
            scope: scope.to_string(),
        }
    }

    /// Declare the signals of all `components` under the top module and
    /// record their values at time 0.
    pub fn write_header<C: VcdComponent>(writer: Rc<RefCell<Self>>, components: &[C]) {
        {
            let mut w = writer.borrow_mut();
            let result = w
                .writer
                .comment(DEFAULT_VCD_HEADER)
                .and_then(|_| w.writer.date(chrono::Utc::now().to_string().as_str()));
            if let Err(err) = result {
                w.vcd_error_handler(err);
            }
        }
        {
            let _vcd_decl_scope =
                VcdWriter::managed_decl_scope(Rc::clone(&writer), DEFAULT_TOP_MODULE);
            writer.borrow_mut().add_integer_var::<u64>("sim_cycles");
            for component in components {
                component.vcd_write_scope(Rc::clone(&writer));
            }
        }
        {
            let mut w = writer.borrow_mut();
            if let Err(err) = w.writer.enddefinitions() {
                w.vcd_error_handler(err);
            }
        }
        {
            let _vcd_trace_scope =
                VcdWriter::managed_trace_scope(Rc::clone(&writer), DEFAULT_TOP_MODULE);
            writer.borrow_mut().enter_cycle();
            writer.borrow_mut().change_vector("sim_cycles", 0);
            for component in components {
                component.vcd_init(Rc::clone(&writer));
            }
        }
    }

    fn enter_scope<T: Display + ?Sized>(&mut self, name: &T) {
        self.scope_stack.push(name.to_string())
    }

    fn record_change(&mut self, id_code: vcd::IdCode, data: BitBox<usize, Lsb0>) {
        if self.is_error_state {
            return;
        }
        self._record_change(id_code, data)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _record_change(&mut self, id_code: vcd::IdCode, data: BitBox<usize, Lsb0>) -> io::Result<()> {
        if let Some(last_data) = self.last_value_map.get(&id_code) {
            if *last_data == data {
                return Ok(());
            }
        }
        self.writer.change_vector(
            id_code,
            data.iter()
                .rev()
                .map(|b| (*b).into())
                .collect::<Vec<vcd::Value>>()
                .as_slice(),
        )?;
        self.last_value_map.insert(id_code, data);
        Ok(())
    }

    /// Record the new value of the signal `name` in the current scope.
    ///
    /// The value is truncated to the declared width of the signal.
    pub fn change_vector(&mut self, name: &str, v: u64) {
        if let Some(id_code) = self.lookup_id_code(name) {
            if cfg!(feature = "trace-echo-vcd-signal-changes") {
                log::trace!("VCD changing {}", self.scoped_name(name));
            }
            let width = self.width_map.get(&id_code).copied().unwrap_or(64);
            let bits = (0..width)
                .map(|i| i < 64 && (v >> i) & 1 == 1)
                .collect::<BitVec<usize, Lsb0>>()
                .into_boxed_bitslice();
            self.record_change(id_code, bits);
        }
    }

    fn lookup_id_code(&self, name: &str) -> Option<vcd::IdCode> {
        let scoped_name = self.scoped_name(name);
        if let Some(id_code) = self.id_map.get(scoped_name.as_str()) {
            Some(*id_code)
        } else {
            log::warn!(
                "No such scoped name {} was defined for VCD dumps.",
                scoped_name
            );
            None
        }
    }

    /// Start a new time step; changes recorded from now on belong to it.
    pub fn enter_cycle(&mut self) {
        if self.is_error_state {
            return;
        }
        let timestamp = self.timestamp;
        self.writer
            .timestamp(timestamp)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
        self.timestamp += 1;
    }

    fn leave_scope<T: Display + ?Sized>(&mut self, scope: &T) {
        let popped_scope = self.scope_stack.pop();
        debug_assert_eq!(popped_scope, Some(scope.to_string()));
    }

    fn add_module<T: Display + ?Sized>(&mut self, name: &T) {
        if self.is_error_state {
            return;
        }
        self._add_module::<T>(name)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _add_module<T: Display + ?Sized>(&mut self, name: &T) -> io::Result<()> {
        self.writer.add_module(&name.to_string())?;
        self.scope_stack.push(name.to_string());
        Ok(())
    }

    fn upscope<T: Display + ?Sized>(&mut self, scope: &T) {
        if self.is_error_state {
            return;
        }
        self.leave_scope(scope);
        self.writer
            .upscope()
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    /// declare an integer signal as wide as `T`.
    pub fn add_integer_var<T: Sized>(&mut self, reference: &str) {
        self.add_var(
            vcd::VarType::Integer,
            std::mem::size_of::<T>() * 8,
            reference,
        );
    }

    /// declare a single bit signal.
    pub fn add_wire(&mut self, reference: &str) {
        self.add_var(vcd::VarType::Wire, 1, reference);
    }

    pub fn add_var(&mut self, var_type: vcd::VarType, width: usize, reference: &str) {
        if self.is_error_state {
            return;
        }
        self._add_var(var_type, width, reference)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _add_var(&mut self, var_type: vcd::VarType, width: usize, reference: &str) -> io::Result<()> {
        let var_id = self
            .writer
            .add_var(var_type, width as u32, reference, None)?;
        self.width_map.insert(var_id, width);
        self.add_id_map(reference, var_id);
        Ok(())
    }

    fn scoped_name(&self, name: &str) -> String {
        self.scope_stack.join(".") + "." + name
    }

    fn add_id_map(&mut self, name: &str, vcd_id: vcd::IdCode) {
        let scoped_name = self.scoped_name(name);
        if self.id_map.contains_key(scoped_name.as_str()) {
            log::warn!(
                "Scoped name {} is was redefined for VCD dumps.",
                scoped_name
            );
        }
        self.id_map.insert(scoped_name, vcd_id);
    }
}

/// An object implementing the VcdComponent declares, initializes and traces
/// the values it exposes in a VCD. Each component opens its own scope.
pub trait VcdComponent {
    /// Declare the variables to be traced, inside the component's scope.
    fn vcd_write_scope(&self, vcd_writer: Rc<RefCell<VcdWriter>>);

    /// Record the initial values.
    fn vcd_init(&self, vcd_writer: Rc<RefCell<VcdWriter>>);

    /// Record the values at the end of a cycle.
    fn vcd_trace(&self, vcd_writer: Rc<RefCell<VcdWriter>>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // collects everything the writer produces
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Counter {
        name: String,
        value: u64,
    }

    impl VcdComponent for Counter {
        fn vcd_write_scope(&self, writer: Rc<RefCell<VcdWriter>>) {
            let _scope = VcdWriter::managed_decl_scope(Rc::clone(&writer), &self.name);
            writer.borrow_mut().add_integer_var::<u8>("value");
            writer.borrow_mut().add_wire("odd");
        }
        fn vcd_init(&self, writer: Rc<RefCell<VcdWriter>>) {
            self.vcd_trace(writer);
        }
        fn vcd_trace(&self, writer: Rc<RefCell<VcdWriter>>) {
            let _scope = VcdWriter::managed_trace_scope(Rc::clone(&writer), &self.name);
            writer.borrow_mut().change_vector("value", self.value);
            writer.borrow_mut().change_vector("odd", self.value % 2);
        }
    }

    #[test]
    fn writes_declarations_and_changes() {
        let _logger = env_logger::builder().try_init();
        let out = SharedBuffer::default();
        let writer = Rc::new(RefCell::new(VcdWriter::from_writer(Box::new(out.clone()))));
        let mut counters = vec![
            Counter {
                name: "c0".to_string(),
                value: 0,
            },
            Counter {
                name: "c1".to_string(),
                value: 0,
            },
        ];
        VcdWriter::write_header(Rc::clone(&writer), &counters);
        for cycle in 1..4u64 {
            counters[0].value = cycle;
            let _scope = VcdWriter::managed_trace_scope(Rc::clone(&writer), DEFAULT_TOP_MODULE);
            writer.borrow_mut().enter_cycle();
            writer.borrow_mut().change_vector("sim_cycles", cycle);
            for c in counters.iter() {
                c.vcd_trace(Rc::clone(&writer));
            }
        }
        assert!(!writer.borrow().is_error_state());

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("$scope module noc $end"));
        assert!(text.contains("$scope module c1 $end"));
        assert!(text.contains("$enddefinitions $end"));
        assert!(text.contains("#3"));
        assert!(text.contains("b00000011 "));
        // c1 never changes after its initial value
        assert_eq!(text.matches("b00000000 ").count(), 2);
    }
}
