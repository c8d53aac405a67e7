use ansi_term::Colour;
use graphletviz::graphlet::utils::save_file;
use graphletviz::graphlet::{Graphlet, GraphletError};
use std::path::Path;

pub fn print_results(graphlets: &[Graphlet], edges: usize) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Results");
    println!("\u{2503}");
    println!("\u{2503} Edges     : {}", Colour::Fixed(226).paint(edges.to_string()));
    println!("\u{2503} Graphlets : {}", Colour::Fixed(226).paint(graphlets.len().to_string()));
    println!("\u{2503}");
    for graphlet in graphlets {
        print_graphlet(graphlet);
    }
    println!("\u{2517}\u{2501}\u{2501}\u{2501}\u{2501}");
}

pub fn print_graphlet(graphlet: &Graphlet) {
    let total = match graphlet.total_bytes {
        Some(bytes) => bytes.to_string(),
        None => "-".to_string(),
    };
    println!(
        "\u{2503} Graphlet {} start {:<8} edges {:<6} prot {:<3} lport {:<5} rport {:<5} rhost {:<5} bytes {}",
        Colour::Red.paint(format!("{:<6}", graphlet.index)),
        graphlet.start_index,
        graphlet.edge_count,
        graphlet.protocols,
        graphlet.local_ports,
        graphlet.remote_ports,
        graphlet.remote_hosts,
        Colour::Fixed(226).paint(total),
    );
}

pub fn data_as_json(graphlets: &[Graphlet]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(graphlets)
}

pub fn data_to_file(data: &str, path: &Path) -> Result<(), GraphletError> {
    log::info!("Writing {}", path.display());
    save_file(path, data)
}
