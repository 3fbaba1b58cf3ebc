// 远程命令转义
// 远程命令被包在双引号中传给 ssh；两跳时内层 ssh 命令本身又是外层的引号参数

/// 转义远程命令：`\` → `\\`，`"` → `\"`
pub fn escape_command(command: &str) -> String {
    command.replace('\\', "\\\\").replace('"', "\\\"")
}

/// escape_command 的逆操作
pub fn unescape_command(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '"')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// 转义后包上双引号
pub fn quote_command(command: &str) -> String {
    format!("\"{}\"", escape_command(command))
}

/// 本地 shell 参数的单引号包裹
pub fn quote_arg(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// 单跳命令行：`ssh <opts> user@host "<escaped>"`
pub fn build_ssh_command(options: &str, user: &str, host: &str, command: &str) -> String {
    format!("ssh {} {}@{} {}", options, user, host, quote_command(command))
}

/// 两跳命令行：host → bridge → target
///
/// 内层命令针对 target 转义一次；整个内层 ssh 命令再作为外层参数转义一次，
/// 因此原始命令在最终命令行中被转义了两次。
pub fn build_nested_command(
    options: &str,
    user: &str,
    bridge: &str,
    target: &str,
    command: &str,
) -> String {
    let inner = build_ssh_command(options, user, target, command);
    build_ssh_command(options, user, bridge, &inner)
}
