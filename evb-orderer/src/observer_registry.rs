// Copyright 2022 Singularity Data
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Observer registry (component D): four separate registries of boxed
//! callbacks, one per [`ObserverKind`], dispatched in registration order.

use evb_common::{
    BarrierSummary, CompleteBarrierObserver, EventObserver, Fragment, LateData, LateDataObserver,
    ObserverKind, PartialBarrierObserver,
};

pub type ObserverId = usize;

#[derive(Default)]
pub struct ObserverRegistry {
    events: Vec<(ObserverId, Box<dyn EventObserver>)>,
    late_data: Vec<(ObserverId, Box<dyn LateDataObserver>)>,
    complete_barrier: Vec<(ObserverId, Box<dyn CompleteBarrierObserver>)>,
    partial_barrier: Vec<(ObserverId, Box<dyn PartialBarrierObserver>)>,
    next_id: ObserverId,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_event_observer(&mut self, observer: Box<dyn EventObserver>) -> ObserverId {
        let id = self.alloc_id();
        self.events.push((id, observer));
        id
    }

    pub fn add_late_data_observer(&mut self, observer: Box<dyn LateDataObserver>) -> ObserverId {
        let id = self.alloc_id();
        self.late_data.push((id, observer));
        id
    }

    pub fn add_complete_barrier_observer(
        &mut self,
        observer: Box<dyn CompleteBarrierObserver>,
    ) -> ObserverId {
        let id = self.alloc_id();
        self.complete_barrier.push((id, observer));
        id
    }

    pub fn add_partial_barrier_observer(
        &mut self,
        observer: Box<dyn PartialBarrierObserver>,
    ) -> ObserverId {
        let id = self.alloc_id();
        self.partial_barrier.push((id, observer));
        id
    }

    pub fn remove_observer(&mut self, kind: ObserverKind, id: ObserverId) {
        match kind {
            ObserverKind::Event => self.events.retain(|(oid, _)| *oid != id),
            ObserverKind::LateData => self.late_data.retain(|(oid, _)| *oid != id),
            ObserverKind::CompleteBarrier => self.complete_barrier.retain(|(oid, _)| *oid != id),
            ObserverKind::PartialBarrier => self.partial_barrier.retain(|(oid, _)| *oid != id),
        }
    }

    pub fn dispatch_events(&mut self, events: &[Fragment]) {
        if events.is_empty() {
            return;
        }
        for (_, observer) in self.events.iter_mut() {
            observer.on_events(events);
        }
    }

    pub fn dispatch_late_data(&mut self, late: &LateData<'_>) {
        for (_, observer) in self.late_data.iter_mut() {
            observer.on_late_data(late);
        }
    }

    pub fn dispatch_complete_barrier(&mut self, summary: &BarrierSummary) {
        for (_, observer) in self.complete_barrier.iter_mut() {
            observer.on_complete_barrier(summary);
        }
    }

    pub fn dispatch_partial_barrier(&mut self, summary: &BarrierSummary) {
        for (_, observer) in self.partial_barrier.iter_mut() {
            observer.on_partial_barrier(summary);
        }
    }
}
