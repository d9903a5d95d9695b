//! Template sources

pub(super) const SYSTEM_EN: &str = r"You are a professional financial analyst.
Base every statement on the data you are given and say so when data is missing.
Be objective, structured and easy to follow. Never give direct buy or sell recommendations.";

pub(super) const SYSTEM_ZH: &str = r"你是一位專業的金融分析師。
所有論述都必須以提供的數據為依據,數據缺失時請明確說明。
分析應客觀、有條理且易於理解。切勿提供直接的買入或賣出建議。

**請使用繁體中文回覆所有內容。**";

pub(super) const ANALYSIS_EN: &str = r"Please analyze the fundamentals of {{ company }} ({{ ticker }}).

Company overview:
- Sector: {{ sector }}
- Industry: {{ industry }}
- Market cap: {{ market_cap }}
- Beta: {{ beta }}
- Business: {{ summary }}

Price over {{ period }}: latest close {{ latest_close }}
{% if indicators %}
Technical indicators (latest):
{% for label, reading in indicators %}
- {{ label }}: {{ reading }}
{% endfor %}
{% endif %}
{% if income %}

Latest annual income statement:
- Total revenue: {{ income.revenue }}
- Gross profit: {{ income.gross_profit }}
- Net income: {{ income.net_income }}
{% endif %}
{% if cash_flow %}

Latest annual cash flow:
- Operating cash flow: {{ cash_flow.operating }}
- Free cash flow: {{ cash_flow.free }}
{% endif %}

Key ratios:
- Trailing P/E: {{ ratios.trailing_pe }}
- Price to book: {{ ratios.price_to_book }}
- Dividend yield: {{ ratios.dividend_yield }}
- ROE (TTM): {{ ratios.return_on_equity }}
{% if provider_news %}

Recent news (market data provider):
{% for item in provider_news %}
{{ loop.index }}. {{ item.title }} (source: {{ item.publisher }}{% if item.published %}, published {{ item.published }}{% endif %})
{% endfor %}
{% endif %}
{% if search_news %}

External news (search):
{% for item in search_news %}
{{ loop.index }}. {{ item.title }} (source: {{ item.publisher }}{% if item.published %}, published {{ item.published }}{% endif %})
{% endfor %}
{% endif %}
{% if search_note %}

News search note: {{ search_note }}
{% endif %}

Task:
1. Using the company profile, latest annual financials, key ratios, technical indicators and the news above (where available), analyze the company's fundamentals.
2. Cover the main strengths, the potential risks and challenges, and weigh the news in the overall assessment.
3. Finish with a summary evaluation and outlook.
4. Be objective and data-driven, with clear paragraphs. Avoid direct investment advice (buy/sell).
5. Your answer will serve as the context for follow-up questions.";

pub(super) const ANALYSIS_ZH: &str = r"請針對以下公司 {{ company }} ({{ ticker }}) 進行基本面分析。

公司概況:
- 產業: {{ sector }}
- 行業: {{ industry }}
- 市值: {{ market_cap }}
- Beta: {{ beta }}
- 主要業務: {{ summary }}

{{ period }} 區間股價: 最新收盤價 {{ latest_close }}
{% if indicators %}
技術指標(最新值):
{% for label, reading in indicators %}
- {{ label }}: {{ reading }}
{% endfor %}
{% endif %}
{% if income %}

最新年度損益表摘要:
- 總營收: {{ income.revenue }}
- 毛利: {{ income.gross_profit }}
- 淨利: {{ income.net_income }}
{% endif %}
{% if cash_flow %}

最新年度現金流量表摘要:
- 營業現金流: {{ cash_flow.operating }}
- 自由現金流: {{ cash_flow.free }}
{% endif %}

近期關鍵財務比率:
- 本益比(TTM): {{ ratios.trailing_pe }}
- 股價淨值比: {{ ratios.price_to_book }}
- 股息殖利率: {{ ratios.dividend_yield }}
- ROE(TTM): {{ ratios.return_on_equity }}
{% if provider_news %}

近期相關財經新聞摘要(來自市場數據供應商):
{% for item in provider_news %}
{{ loop.index }}. 標題: {{ item.title }} (來源: {{ item.publisher }}{% if item.published %}, 發布時間: {{ item.published }}{% endif %})
{% endfor %}
{% endif %}
{% if search_news %}

近期相關外部財經新聞摘要(來自新聞搜尋):
{% for item in search_news %}
{{ loop.index }}. 標題: {{ item.title }} (來源: {{ item.publisher }}{% if item.published %}, 發布時間: {{ item.published }}{% endif %})
{% endfor %}
{% endif %}
{% if search_note %}

外部財經新聞搜尋提示: {{ search_note }}
{% endif %}

任務指示:
1. 基於以上提供的公司基本資料、最新的年度財務摘要、關鍵比率、技術指標以及近期相關財經新聞摘要(如果有的話),用繁體中文分析這家公司的基本面情況。
2. 分析應包括公司的主要優勢、潛在風險和挑戰,並結合所有提供的新聞資訊進行綜合評估。
3. 提供一個完整的總結性評價和未來展望。
4. 分析應客觀且基於數據,段落分明,易於理解。避免提供直接的投資建議(買入/賣出)。
5. 你的回答將作為後續對話的初始上下文。";
