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

//! Hardware blocks of a tile: the router with its buffers, arbiter and lookup
//! memories, the processing elements, and the channels that connect them.
//! The power model charges the energy they spend.

pub(super) mod arbiter;
pub(super) mod buffer;
pub(super) mod config;
pub(super) mod link;
pub(super) mod pe;
pub(super) mod power;
pub(super) mod router;
pub(super) mod sram;
pub(super) mod tcam;
pub(super) mod topologies;
