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

use petgraph::prelude::*;

use crate::Port;

mod mesh;
mod torus;

pub use mesh::{boundary_ports, mesh};
pub use torus::torus;

/// The ports a simplex link connects: it leaves its source tile through
/// `src_port` and enters its destination tile through `dst_port`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub src_port: Port,
    pub dst_port: Port,
}

/// Tiles are nodes, weighted with their id. Every physical link is a pair of
/// simplex edges.
pub type TopologyGraph = DiGraph<usize, Link>;

/// return the linear index of the element in a multi-dimensional grid
/// The element is represented as a vector of coordinates in `dims`.
pub(crate) fn linearize_index(elem: &[usize], dims: &[usize]) -> usize {
    let mut index: usize = 0;
    for (d, c) in elem.iter().enumerate() {
        index += c * dims[0..d].iter().product::<usize>();
    }
    index
}

/// given a linear index of the element, return the vector of coordinates in a
/// multi-dimensional grid of `dims` dimensions.
pub(crate) fn delinearize_index(index: usize, dims: &[usize]) -> Vec<usize> {
    let mut idx = index;
    let mut elem = vec![0; dims.len()];

    for (d, m) in dims.iter().enumerate().rev() {
        let prod = dims[0..d].iter().product::<usize>();
        if d == 0 {
            elem[d] = idx % m;
        } else {
            elem[d] = idx / prod;
            idx -= elem[d] * prod;
        }
    }
    elem
}

// the pair of ports of a link from `e` to its successor along dimension `d`.
// x grows eastwards and y southwards.
fn link_ports(d: usize) -> (Link, Link) {
    let (forward, backward) = if d == 0 {
        (Port::East, Port::West)
    } else {
        (Port::South, Port::North)
    };
    (
        Link {
            src_port: forward,
            dst_port: backward,
        },
        Link {
            src_port: backward,
            dst_port: forward,
        },
    )
}

// create one node per tile, ids in row major order.
fn add_tiles(dims: &[usize]) -> TopologyGraph {
    assert_eq!(dims.len(), 2, "tiles are laid out in two dimensions");
    let mut graph = TopologyGraph::new();
    for n in 0..dims.iter().product() {
        let node = graph.add_node(n);
        debug_assert_eq!(node.index(), n);
    }
    graph
}

#[cfg(test)]
mod topology_tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn test_linearize() {
        assert_eq!(linearize_index(&[1, 1], &[4, 4]), 5);
        assert_eq!(linearize_index(&[1, 1], &[5, 5]), 6);
        assert_eq!(linearize_index(&[3, 3], &[4, 4]), 15);
        // x + y * dim_x
        assert_eq!(linearize_index(&[2, 1], &[3, 2]), 5);
    }
    #[test]
    fn test_delinearize() {
        assert_eq!(delinearize_index(6, &[4, 4]), vec![2, 1]);
        assert_eq!(delinearize_index(6, &[5, 5]), vec![1, 1]);
        assert_eq!(delinearize_index(15, &[4, 4]), vec![3, 3]);
    }
    #[test]
    fn test_lindelin() {
        let dims = vec![3, 4];
        for e in dims.iter().map(|&d| 0..d).multi_cartesian_product() {
            assert_eq!(delinearize_index(linearize_index(&e, &dims), &dims), e);
        }
    }
}
