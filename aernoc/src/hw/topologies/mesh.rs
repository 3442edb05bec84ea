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

use super::{add_tiles, delinearize_index, link_ports, linearize_index};
use super::TopologyGraph;
use crate::Port;
use itertools::Itertools;
use petgraph::graph::node_index;

/// The compass ports of tile `id` that have no neighbor in a mesh.
///
/// Row 0 has no north neighbor, the last row no south neighbor, column 0 no
/// west neighbor and the last column no east neighbor.
pub fn boundary_ports(id: usize, dims: &[usize]) -> Vec<Port> {
    let e = delinearize_index(id, dims);
    let (x, y) = (e[0], e[1]);
    let mut ports = Vec::new();
    if y == 0 {
        ports.push(Port::North);
    }
    if x == dims[0] - 1 {
        ports.push(Port::East);
    }
    if y == dims[1] - 1 {
        ports.push(Port::South);
    }
    if x == 0 {
        ports.push(Port::West);
    }
    ports
}

/// A 2-D grid of tiles.
///
/// Tile ids are row major, `id = y * dim_x + x`. Tiles on the border lack the
/// links that would leave the grid.
/// <pre>
/// 0 --- 1 --- 2 --- 3   ^
/// |     |     |     |   |
/// 4 --- 5 --- 6 --- 7   y-dim
/// |     |     |     |   |
/// 8 --- 9 --- 10--- 11  v
/// < ----- x-dim ---->
/// </pre>
pub fn mesh(dims: &[usize]) -> TopologyGraph {
    let mut graph = add_tiles(dims);

    for n in 0..dims.iter().product() {
        log::debug!(
            "tile {}, coords {:?}, no link to [{}]",
            n,
            delinearize_index(n, dims),
            boundary_ports(n, dims).iter().format(",")
        );
    }

    // build the links: for each tile, add the connections to their
    // "higher" neighbors.
    for e in dims.iter().map(|&d| 0..d).multi_cartesian_product() {
        for (d, &m) in dims.iter().enumerate() {
            if e[d] + 1 < m {
                let mut n = e.clone();
                n[d] = e[d] + 1;
                let src = node_index(linearize_index(&e, dims));
                let dst = node_index(linearize_index(&n, dims));
                let (there, back) = link_ports(d);
                // all the links are bidirectional
                graph.add_edge(src, dst, there);
                graph.add_edge(dst, src, back);
            }
        }
    }

    graph
}

#[cfg(test)]
mod topology_tests {
    use super::*;
    use petgraph::visit::EdgeRef;
    use petgraph::Direction;
    use std::collections::BTreeSet;

    fn connected_ports(graph: &TopologyGraph, id: usize) -> BTreeSet<Port> {
        graph
            .edges_directed(node_index(id), Direction::Outgoing)
            .map(|edge| edge.weight().src_port)
            .collect()
    }

    #[test]
    fn test_mesh() {
        let _logger = env_logger::builder().try_init();
        let dims = [4, 3];
        let topo = mesh(&dims);
        assert_eq!(topo.node_count(), 12);
        // 2 * ((x - 1) * y + x * (y - 1)) simplex links
        assert_eq!(topo.edge_count(), 2 * (3 * 3 + 4 * 2));

        // corner, border and middle tiles
        assert_eq!(connected_ports(&topo, 0).len(), 2);
        assert_eq!(connected_ports(&topo, 11).len(), 2);
        assert_eq!(connected_ports(&topo, 1).len(), 3);
        assert_eq!(connected_ports(&topo, 4).len(), 3);
        assert_eq!(connected_ports(&topo, 5).len(), 4);

        for e in dims.iter().map(|&d| 0..d).multi_cartesian_product() {
            let id = linearize_index(&e, &dims);
            let ports = connected_ports(&topo, id);
            // exactly the boundary ports are missing
            for p in boundary_ports(id, &dims) {
                assert!(!ports.contains(&p));
            }
            assert_eq!(ports.len() + boundary_ports(id, &dims).len(), 4);
        }
    }

    #[test]
    fn test_mesh_neighbors() {
        let dims = [3, 3];
        let topo = mesh(&dims);
        // tile 4 is the center: north 1, east 5, south 7, west 3
        let mut seen = topo
            .edges_directed(node_index(4), Direction::Outgoing)
            .map(|edge| (edge.weight().src_port, edge.target().index()))
            .collect::<Vec<_>>();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                (Port::North, 1),
                (Port::East, 5),
                (Port::South, 7),
                (Port::West, 3)
            ]
        );
        for edge in topo.edge_weights() {
            assert_eq!(edge.src_port.opposite(), Some(edge.dst_port));
        }
    }

    #[test]
    fn test_boundary_ports() {
        let dims = [2, 2];
        assert_eq!(boundary_ports(0, &dims), vec![Port::North, Port::West]);
        assert_eq!(boundary_ports(1, &dims), vec![Port::North, Port::East]);
        assert_eq!(boundary_ports(2, &dims), vec![Port::South, Port::West]);
        assert_eq!(boundary_ports(3, &dims), vec![Port::East, Port::South]);
        assert!(boundary_ports(4, &[3, 3]).is_empty());
    }
}
