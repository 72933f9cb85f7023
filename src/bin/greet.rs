use research_agent::prompt::GREETING;

fn main() {
    for line in GREETING {
        println!("{line}");
    }
}
