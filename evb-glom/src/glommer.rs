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

//! Glommer state machine (component F): groups time-adjacent ordered
//! fragments into composite events within a coincidence window.

use evb_common::{Fragment, PHYSICS_EVENT};
use prometheus::Registry;

use crate::config::GlomConfig;
use crate::observer::CompositeObserver;
use crate::stats::GlomStats;
use crate::types::{assign_timestamp, Composite, GlomParameters};
use evb_common::AdapterResult;

pub struct Glommer {
    config: GlomConfig,
    accumulated: Vec<Fragment>,
    first_ts: u64,
    last_ts: u64,
    sum_ts: u128,
    count: u64,
    emitted_parameters: bool,
    observers: Vec<Box<dyn CompositeObserver>>,
    stats: GlomStats,
}

impl Glommer {
    pub fn new(config: GlomConfig) -> AdapterResult<Self> {
        Self::with_metrics_registry(config, Registry::new())
    }

    pub fn with_metrics_registry(config: GlomConfig, registry: Registry) -> AdapterResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            accumulated: Vec::new(),
            first_ts: 0,
            last_ts: 0,
            sum_ts: 0,
            count: 0,
            emitted_parameters: false,
            observers: Vec::new(),
            stats: GlomStats::new(registry),
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn CompositeObserver>) {
        self.observers.push(observer);
    }

    pub fn metrics(&self) -> &GlomStats {
        &self.stats
    }

    fn ensure_parameters_emitted(&mut self) {
        if self.emitted_parameters {
            return;
        }
        self.emitted_parameters = true;
        let params = GlomParameters {
            dt: self.config.dt,
            building: self.config.building,
            policy: self.config.policy,
        };
        tracing::info!(dt = ?params.dt, building = params.building, policy = ?params.policy, "glom parameters");
        for observer in self.observers.iter_mut() {
            observer.on_glom_parameters(&params);
        }
    }

    /// Feed one orderer-emitted fragment through the coincidence-window
    /// policy. Fragments must arrive in the same
    /// non-decreasing timestamp order the orderer emits them in.
    pub fn process_fragment(&mut self, fragment: Fragment) {
        self.ensure_parameters_emitted();

        if !self.config.building {
            self.emit_singleton(fragment);
            return;
        }

        if fragment.is_barrier() {
            self.flush();
            self.emit_singleton(fragment);
            return;
        }

        let dt = self.config.dt.expect("validated at construction");
        if self.accumulated.is_empty() {
            self.start_accumulation(fragment);
        } else if fragment.timestamp.saturating_sub(self.first_ts) > dt {
            self.flush();
            self.start_accumulation(fragment);
        } else {
            self.append(fragment);
        }
    }

    fn start_accumulation(&mut self, fragment: Fragment) {
        self.first_ts = fragment.timestamp;
        self.last_ts = fragment.timestamp;
        self.sum_ts = fragment.timestamp as u128;
        self.count = 1;
        self.accumulated.push(fragment);
    }

    fn append(&mut self, fragment: Fragment) {
        self.last_ts = fragment.timestamp;
        self.sum_ts += fragment.timestamp as u128;
        self.count += 1;
        self.accumulated.push(fragment);
    }

    /// Synthesize a composite from whatever is accumulated, emit it, and
    /// reset the accumulator. A no-op when nothing is accumulated.
    pub fn flush(&mut self) {
        if self.accumulated.is_empty() {
            return;
        }
        let timestamp = assign_timestamp(
            self.config.policy,
            self.first_ts,
            self.last_ts,
            self.sum_ts,
            self.count,
        );
        let children = std::mem::take(&mut self.accumulated);
        let child_count = children.len() as u64;
        self.count = 0;
        self.sum_ts = 0;

        let composite = Composite::new(PHYSICS_EVENT, self.config.source_id, timestamp, children);
        self.stats.composites_emitted.inc();
        self.stats.children_glommed.inc_by(child_count);
        for observer in self.observers.iter_mut() {
            observer.on_composite(&composite);
        }
    }

    /// A barrier's own type identifies it downstream; a passthrough data
    /// fragment (emitted when `building == false`) is labeled as a plain
    /// physics event since the orderer's `Fragment` no longer carries the
    /// upstream item's type.
    fn emit_singleton(&mut self, fragment: Fragment) {
        let inner_type = if fragment.is_barrier() {
            fragment.barrier_type
        } else {
            PHYSICS_EVENT
        };
        let composite = Composite::new(inner_type, self.config.source_id, fragment.timestamp, vec![fragment]);
        self.stats.composites_emitted.inc();
        self.stats.children_glommed.inc();
        for observer in self.observers.iter_mut() {
            observer.on_composite(&composite);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use evb_common::END_RUN;

    use super::*;
    use crate::config::Policy;

    struct CollectingObserver {
        composites: Arc<Mutex<Vec<Composite>>>,
        parameters: Arc<Mutex<Vec<GlomParameters>>>,
    }

    impl CompositeObserver for CollectingObserver {
        fn on_glom_parameters(&mut self, params: &GlomParameters) {
            self.parameters.lock().unwrap().push(*params);
        }

        fn on_composite(&mut self, composite: &Composite) {
            self.composites.lock().unwrap().push(composite.clone());
        }
    }

    fn glommer(dt: u64, policy: Policy) -> (Glommer, Arc<Mutex<Vec<Composite>>>, Arc<Mutex<Vec<GlomParameters>>>) {
        let config = GlomConfig {
            dt: Some(dt),
            building: true,
            policy,
            source_id: 7,
        };
        let mut glommer = Glommer::new(config).unwrap();
        let composites = Arc::new(Mutex::new(Vec::new()));
        let parameters = Arc::new(Mutex::new(Vec::new()));
        glommer.add_observer(Box::new(CollectingObserver {
            composites: composites.clone(),
            parameters: parameters.clone(),
        }));
        (glommer, composites, parameters)
    }

    // S6 - glommer coincidence.
    #[test]
    fn s6_coincidence_window_with_average_policy_and_a_splitting_barrier() {
        let (mut glommer, composites, parameters) = glommer(50, Policy::Average);

        for ts in [100u64, 110] {
            glommer.process_fragment(Fragment::new(ts, 7, 0, &b""[..]));
        }
        glommer.process_fragment(Fragment::new(130, 7, END_RUN, &b""[..]));
        for ts in [160u64, 165] {
            glommer.process_fragment(Fragment::new(ts, 7, 0, &b""[..]));
        }
        glommer.flush();

        let composites = composites.lock().unwrap();
        assert_eq!(composites.len(), 3);
        assert_eq!(composites[0].timestamp, 105);
        assert_eq!(composites[0].children.len(), 2);
        assert!(composites[1].item_type & evb_common::COMPOSITE_BIT != 0);
        assert_eq!(composites[2].timestamp, 162);
        assert_eq!(composites[2].children.len(), 2);

        assert_eq!(parameters.lock().unwrap().len(), 1);
    }

    #[test]
    fn building_disabled_emits_a_singleton_per_fragment() {
        let config = GlomConfig {
            dt: None,
            building: false,
            policy: Policy::First,
            source_id: 1,
        };
        let mut glommer = Glommer::new(config).unwrap();
        let composites = Arc::new(Mutex::new(Vec::new()));
        glommer.add_observer(Box::new(CollectingObserver {
            composites: composites.clone(),
            parameters: Arc::new(Mutex::new(Vec::new())),
        }));

        glommer.process_fragment(Fragment::new(10, 1, 0, &b""[..]));
        glommer.process_fragment(Fragment::new(20, 1, 0, &b""[..]));

        assert_eq!(composites.lock().unwrap().len(), 2);
    }

    #[test]
    fn flush_on_empty_accumulator_is_a_no_op() {
        let (mut glommer, composites, _parameters) = glommer(50, Policy::First);
        glommer.flush();
        assert!(composites.lock().unwrap().is_empty());
    }

    #[test]
    fn first_policy_uses_the_accumulation_start_timestamp() {
        let (mut glommer, composites, _parameters) = glommer(50, Policy::First);
        glommer.process_fragment(Fragment::new(100, 7, 0, &b""[..]));
        glommer.process_fragment(Fragment::new(120, 7, 0, &b""[..]));
        glommer.flush();
        assert_eq!(composites.lock().unwrap()[0].timestamp, 100);
    }
}
