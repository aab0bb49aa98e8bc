use insta::assert_snapshot;
use procwatch::format::render_csv;
use procwatch::system::normalize::normalize_row;
use procwatch::system::process::{Process, select_top};

const TOTAL_MEMORY: u64 = 1_000_000_000;

const FIXTURE: &str = "\
  PID  PPID  %CPU %MEM COMM             STAT COMMAND
    1     0   0.0  0.1 launchd          Ss   /sbin/launchd
  412     1  12.5  2.5 Web Content      S    /Applications/Firefox.app/Contents/MacOS/plugin-container.app/Contents/MacOS/plugin-container -childID 3
  733     1  48,2  1.0 node             R+   node /srv/app/server.js
  990   412   3.0  0.0 zsh              Ss+  -zsh
garbage line
 1201     1   0.5  0.2 Cursor Helper (Renderer) S /Applications/Cursor.app/Contents/Frameworks/Cursor Helper (Renderer).app/Contents/MacOS/Cursor Helper (Renderer) --type=renderer
";

fn normalized_fixture() -> Vec<Process> {
    FIXTURE
        .lines()
        .skip(1)
        .filter_map(|line| normalize_row(line, TOTAL_MEMORY).ok())
        .collect()
}

#[test]
fn ranked_fixture_as_csv() {
    let processes = normalized_fixture();
    assert_eq!(processes.len(), 5);

    let ranked = select_top(processes, 10);
    let csv = render_csv(&ranked);
    assert_snapshot!(csv.trim_end(), @r"
    PID,Process Name,CPU (%),Memory (bytes),Status
    733,server.js,48.2,10000000,Running (Foreground)
    412,plugin-container,12.5,25000000,Sleeping
    990,zsh,3.0,0,Sleeping (Session Leader) (Foreground)
    1201,Cursor,0.5,2000000,Sleeping
    1,launchd,0.0,1000000,Sleeping (Session Leader)
    ");
}

#[test]
fn process_wire_shape() {
    let processes = normalized_fixture();
    let zsh = processes
        .iter()
        .find(|p| p.pid == 990)
        .expect("zsh row normalized");
    let json = serde_json::to_string_pretty(zsh).unwrap();
    assert_snapshot!(json, @r#"
    {
      "pid": 990,
      "ppid": 412,
      "cpuPercent": 3.0,
      "memoryBytes": 0,
      "name": "zsh",
      "state": {
        "base": "sleeping",
        "flags": [
          "sessionLeader",
          "foreground"
        ]
      },
      "command": "-zsh"
    }
    "#);
}
