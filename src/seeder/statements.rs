//! Bundled political-domain graph.
//!
//! Every statement is a `MERGE`, so replaying the list after a partial failure
//! does not duplicate nodes or relationships.

use crate::graph::Statement;

const STATEMENTS: &[&str] = &[
    "MERGE (p:Person {name: 'Ada Vale'}) SET p.born = 1971",
    "MERGE (p:Person {name: 'Tomas Reyes'}) SET p.born = 1966",
    "MERGE (p:Person {name: 'Mira Kovac'}) SET p.born = 1983",
    "MERGE (:Position {title: 'Prime Minister'})",
    "MERGE (:Position {title: 'Minister of Finance'})",
    "MERGE (:Position {title: 'Leader of the Opposition'})",
    "MERGE (:PoliticalParty {name: 'Unity Party', founded: 1994})",
    "MERGE (:PoliticalParty {name: 'Green Alliance', founded: 2008})",
    "MERGE (:Direction {name: 'Centre-left'})",
    "MERGE (:Direction {name: 'Green politics'})",
    "MERGE (:Value {name: 'Social equality'})",
    "MERGE (:Value {name: 'Environmental protection'})",
    "MERGE (:Goal {name: 'Universal public transport'})",
    "MERGE (:Goal {name: 'Balanced budget'})",
    "MERGE (:Consequence {name: 'Lower emissions'})",
    "MERGE (:Consequence {name: 'Higher fuel taxes'})",
    "MATCH (p:Person {name: 'Ada Vale'}), (o:Position {title: 'Prime Minister'}) \
     MERGE (p)-[:HOLDS {since: 2019}]->(o)",
    "MATCH (p:Person {name: 'Tomas Reyes'}), (o:Position {title: 'Minister of Finance'}) \
     MERGE (p)-[:HOLDS {since: 2021}]->(o)",
    "MATCH (p:Person {name: 'Mira Kovac'}), (o:Position {title: 'Leader of the Opposition'}) \
     MERGE (p)-[:HOLDS {since: 2022}]->(o)",
    "MATCH (p:Person {name: 'Ada Vale'}), (g:PoliticalParty {name: 'Unity Party'}) \
     MERGE (p)-[:MEMBER_OF]->(g)",
    "MATCH (p:Person {name: 'Tomas Reyes'}), (g:PoliticalParty {name: 'Unity Party'}) \
     MERGE (p)-[:MEMBER_OF]->(g)",
    "MATCH (p:Person {name: 'Mira Kovac'}), (g:PoliticalParty {name: 'Green Alliance'}) \
     MERGE (p)-[:MEMBER_OF]->(g)",
    "MATCH (g:PoliticalParty {name: 'Unity Party'}), (d:Direction {name: 'Centre-left'}) \
     MERGE (g)-[:ALIGNED_WITH]->(d)",
    "MATCH (g:PoliticalParty {name: 'Green Alliance'}), (d:Direction {name: 'Green politics'}) \
     MERGE (g)-[:ALIGNED_WITH]->(d)",
    "MATCH (g:PoliticalParty {name: 'Unity Party'}), (v:Value {name: 'Social equality'}) \
     MERGE (g)-[:SUPPORTS]->(v)",
    "MATCH (g:PoliticalParty {name: 'Green Alliance'}), (v:Value {name: 'Environmental protection'}) \
     MERGE (g)-[:SUPPORTS]->(v)",
    "MATCH (p:Person {name: 'Ada Vale'}), (t:Goal {name: 'Universal public transport'}) \
     MERGE (p)-[:PURSUES]->(t)",
    "MATCH (p:Person {name: 'Tomas Reyes'}), (t:Goal {name: 'Balanced budget'}) \
     MERGE (p)-[:PURSUES]->(t)",
    "MATCH (p:Person {name: 'Mira Kovac'}), (t:Goal {name: 'Balanced budget'}) \
     MERGE (p)-[:OPPOSES]->(t)",
    "MATCH (t:Goal {name: 'Universal public transport'}), (c:Consequence {name: 'Lower emissions'}) \
     MERGE (t)-[:LEADS_TO]->(c)",
    "MATCH (t:Goal {name: 'Balanced budget'}), (c:Consequence {name: 'Higher fuel taxes'}) \
     MERGE (t)-[:LEADS_TO]->(c)",
];

/// The bundled statement list, in execution order (nodes before edges).
pub fn political_statements() -> Vec<Statement> {
    STATEMENTS.iter().map(|s| Statement::new(*s)).collect()
}
