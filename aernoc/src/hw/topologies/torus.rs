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

use super::TopologyGraph;
use super::{add_tiles, link_ports, linearize_index};
use itertools::Itertools;
use petgraph::graph::node_index;

/// A 2-D grid of tiles whose rows and columns wrap around, so that every
/// tile has all four compass neighbors.
pub fn torus(dims: &[usize]) -> TopologyGraph {
    let mut graph = add_tiles(dims);

    // build the links: for each tile, add the connections to their
    // "higher" neighbors, wrapping at the edge of the grid.
    for e in dims.iter().map(|&ub| 0..ub).multi_cartesian_product() {
        for (d, m) in dims.iter().enumerate() {
            let mut n = e.clone();
            n[d] = (e[d] + 1) % m;

            let src = node_index(linearize_index(&e, dims));
            let dst = node_index(linearize_index(&n, dims));
            let (there, back) = link_ports(d);

            // all the links are bidirectional
            graph.add_edge(src, dst, there);
            graph.add_edge(dst, src, back);
        }
    }

    graph
}

#[cfg(test)]
mod topology_tests {
    use super::*;
    use crate::hw::topologies::delinearize_index;
    use crate::Port;
    use petgraph::visit::EdgeRef;
    use petgraph::Direction;
    use std::collections::BTreeSet;

    #[test]
    fn test_torus() {
        let _logger = env_logger::builder().try_init();
        let (x, y) = (4, 3);
        let dims = vec![x, y];
        let topo = torus(&dims);
        assert_eq!(topo.node_count(), x * y);
        assert_eq!(topo.edge_count(), 4 * x * y);

        for n in topo.node_indices() {
            let ports = topo
                .edges_directed(n, Direction::Outgoing)
                .map(|edge| edge.weight().src_port)
                .collect::<BTreeSet<_>>();
            assert_eq!(ports.len(), 4, "tile {} misses a port", n.index());
        }

        /*
          0  1  2  3
          4  5  6  7
          8  9 10 11

         0 is connected to 8 (north), 1 (east), 4 (south), 3 (west)
        */
        let expected = [(Port::North, 8), (Port::East, 1), (Port::South, 4), (Port::West, 3)];
        for edge in topo.edges_directed(node_index(0), Direction::Outgoing) {
            let e = delinearize_index(edge.target().index(), &dims);
            log::debug!("\tneighbor: {:?} via {}", e, edge.weight().src_port);
            assert!(expected.contains(&(edge.weight().src_port, edge.target().index())));
        }
    }

    #[test]
    fn test_smallest_torus() {
        // with two tiles per row east and west lead to the same neighbor, over
        // two distinct links
        let topo = torus(&[2, 2]);
        let targets = topo
            .edges_directed(node_index(0), Direction::Outgoing)
            .map(|edge| (edge.weight().src_port, edge.target().index()))
            .collect::<BTreeSet<_>>();
        assert_eq!(
            targets,
            vec![(Port::North, 2), (Port::East, 1), (Port::South, 2), (Port::West, 1)]
                .into_iter()
                .collect()
        );
    }
}
