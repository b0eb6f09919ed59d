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

//! Downstream sink for the glommer's output (component F), following the
//! same tagged-trait shape as the orderer's observer registry rather than
//! a heterogeneous listener list.

use crate::types::{Composite, GlomParameters};

pub trait CompositeObserver: Send {
    /// Invoked once, before any composite, with the effective
    /// configuration (an explicit "Glom Parameters" record emitted once
    /// at start).
    fn on_glom_parameters(&mut self, params: &GlomParameters);

    fn on_composite(&mut self, composite: &Composite);
}
