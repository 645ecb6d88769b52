//! 工具调用 system prompt 组装
//!
//! 把注册工具的函数签名以 <tools> 块注入 system prompt，并给出 <tool_call> 调用模板。
//! 基础 prompt 含 `{tools}` 占位符时原位替换，否则追加到末尾。

use crate::tools::ToolRegistry;

const FN_CALL_TEMPLATE: &str = r#"# 工具相关
## 提供给你的工具

You are provided with function signatures within <tools></tools> XML tags:
<tools>
{tool_descs}
</tools>

## 使用工具

You may call one or more functions to assist with the user query.
For each function call, return a json object with function name and arguments within <tool_call></tool_call> XML tags.
You are allowed to call functions multiple times across multiple turns if needed.
``` 调用工具模板
<tool_call>
{"name": <function-name>, "arguments": <args-json-object>}
</tool_call>
```
"#;

/// 组装带工具说明的 system prompt
pub fn fncall_system_prompt(base: &str, registry: &ToolRegistry) -> String {
    let tool_descs = registry
        .to_function_descs()
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    let tools_prompt = FN_CALL_TEMPLATE.replace("{tool_descs}", &tool_descs);

    if base.contains("{tools}") {
        base.replace("{tools}", &tools_prompt)
    } else if base.is_empty() {
        tools_prompt
    } else {
        format!("{}\n\n{}", base, tools_prompt)
    }
}
